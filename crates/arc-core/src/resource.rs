//! Resource contract and the ordered composite

use arc_cloud::{Request, Response};
use async_trait::async_trait;

/// A node of the resource tree
#[async_trait(?Send)]
pub trait Resource {
    fn name(&self) -> &str;

    fn created(&self) -> bool;

    fn destroyed(&self) -> bool;

    /// Handle `req` here or pass it to the child named by its path
    async fn route(&mut self, req: &mut Request) -> Response;
}

/// Children in construction order
#[derive(Debug)]
pub struct Resources<R> {
    items: Vec<R>,
}

impl<R> Default for Resources<R> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<R> From<Vec<R>> for Resources<R> {
    fn from(items: Vec<R>) -> Self {
        Self { items }
    }
}

impl<R: Resource> Resources<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: R) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, R> {
        self.items.iter_mut()
    }

    pub fn get(&self, name: &str) -> Option<&R> {
        self.items.iter().find(|r| r.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut R> {
        self.items.iter_mut().find(|r| r.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.items.iter().map(|r| r.name().to_string()).collect()
    }

    /// Every child is created; an empty collection has nothing created
    pub fn created(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|r| r.created())
    }

    pub fn destroyed(&self) -> bool {
        self.items.iter().all(|r| r.destroyed())
    }

    /// Route a copy of `req` to each child, first to last, stopping at the
    /// first response that is not OK
    pub async fn route_in_order(&mut self, req: &Request) -> Response {
        for item in self.items.iter_mut() {
            let mut child = req.clone();
            let response = item.route(&mut child).await;
            if !response.is_ok() {
                return response;
            }
        }
        Response::Ok
    }

    /// Same as [`Resources::route_in_order`], last to first
    pub async fn route_reverse_order(&mut self, req: &Request) -> Response {
        for item in self.items.iter_mut().rev() {
            let mut child = req.clone();
            let response = item.route(&mut child).await;
            if !response.is_ok() {
                return response;
            }
        }
        Response::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Probe {
        name: String,
        visits: Rc<RefCell<Vec<String>>>,
        created: bool,
        response: Response,
    }

    #[async_trait(?Send)]
    impl Resource for Probe {
        fn name(&self) -> &str {
            &self.name
        }

        fn created(&self) -> bool {
            self.created
        }

        fn destroyed(&self) -> bool {
            !self.created
        }

        async fn route(&mut self, _req: &mut Request) -> Response {
            self.visits.borrow_mut().push(self.name.clone());
            self.response
        }
    }

    fn probes(count: usize, visits: &Rc<RefCell<Vec<String>>>) -> Resources<Probe> {
        (0..count)
            .map(|i| Probe {
                name: format!("c{}", i),
                visits: visits.clone(),
                created: true,
                response: Response::Ok,
            })
            .collect::<Vec<_>>()
            .into()
    }

    fn request() -> Request {
        Request::new("dev", "alice", Utc::now(), &["destroy"])
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    proptest! {
        #[test]
        fn prop_reverse_order_mirrors_in_order(count in 0usize..12) {
            let visits = Rc::new(RefCell::new(Vec::new()));
            let mut children = probes(count, &visits);

            block_on(children.route_in_order(&request()));
            let forward = visits.borrow().clone();
            visits.borrow_mut().clear();

            block_on(children.route_reverse_order(&request()));
            let mut backward = visits.borrow().clone();
            backward.reverse();

            prop_assert_eq!(forward.len(), count);
            prop_assert_eq!(forward, backward);
        }
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let visits = Rc::new(RefCell::new(Vec::new()));
        let mut children = probes(3, &visits);
        children.iter_mut().nth(1).unwrap().response = Response::Fail;

        assert_eq!(children.route_in_order(&request()).await, Response::Fail);
        assert_eq!(*visits.borrow(), vec!["c0", "c1"]);

        visits.borrow_mut().clear();
        assert_eq!(children.route_reverse_order(&request()).await, Response::Fail);
        assert_eq!(*visits.borrow(), vec!["c2", "c1"]);
    }

    #[test]
    fn test_composite_state() {
        let visits = Rc::new(RefCell::new(Vec::new()));
        let empty = probes(0, &visits);
        assert!(!empty.created());
        assert!(empty.destroyed());

        let mut children = probes(2, &visits);
        assert!(children.created());
        assert!(!children.destroyed());

        children.get_mut("c0").unwrap().created = false;
        // partial state: neither created nor destroyed
        assert!(!children.created());
        assert!(!children.destroyed());
    }
}
