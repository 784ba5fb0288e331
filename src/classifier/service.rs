use super::{ClassifierClient, Domain, Prediction};
use crate::error::ClassifierError;
use crate::pose::Pose;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::Service;

/// `tower` view of the prediction endpoint for one domain.
#[derive(Debug, Clone)]
pub struct PredictService {
    client: ClassifierClient,
    domain: Domain,
}

impl PredictService {
    pub fn new(client: ClassifierClient, domain: Domain) -> Self {
        Self { client, domain }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }
}

impl Service<Pose> for PredictService {
    type Response = Prediction;
    type Error = ClassifierError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, pose: Pose) -> Self::Future {
        // Clone outside the async block so the future does not borrow self.
        let client = self.client.clone();
        let domain = self.domain;
        Box::pin(async move { client.predict(domain, &pose).await })
    }
}
