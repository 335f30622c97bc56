pub mod oidc;

use async_trait::async_trait;
use tracing::debug;

use crate::check::{CheckRequest, CheckResponse, Outcome};

/// Filter processes an authorization check, mutating the response.
///
/// Filters compose into pipelines; processing passes from one filter to the
/// next. `Ok` lets the request continue, any other outcome stops the
/// pipeline and is relayed to the caller.
#[async_trait]
pub trait Filter: Send + Sync {
	async fn process(&self, request: &CheckRequest, response: &mut CheckResponse) -> Outcome;

	/// Well-known name of the filter, for logging.
	fn name(&self) -> &'static str;
}

/// Pipe runs filters in order, stopping at the first non-`Ok` outcome.
#[derive(Default)]
pub struct Pipe {
	filters: Vec<Box<dyn Filter>>,
}

impl Pipe {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_filter(&mut self, filter: Box<dyn Filter>) -> &mut Self {
		self.filters.push(filter);
		self
	}
}

#[async_trait]
impl Filter for Pipe {
	async fn process(&self, request: &CheckRequest, response: &mut CheckResponse) -> Outcome {
		for filter in &self.filters {
			let outcome = filter.process(request, response).await;
			if outcome != Outcome::Ok {
				debug!(
					filter = filter.name(),
					outcome = outcome.as_str(),
					"filter stopped the pipeline"
				);
				return outcome;
			}
		}
		Outcome::Ok
	}

	fn name(&self) -> &'static str {
		"pipe"
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	struct FixedFilter {
		outcome: Outcome,
		calls: Arc<AtomicUsize>,
	}

	impl FixedFilter {
		fn new(outcome: Outcome, calls: Arc<AtomicUsize>) -> Self {
			Self { outcome, calls }
		}
	}

	#[async_trait]
	impl Filter for FixedFilter {
		async fn process(&self, _request: &CheckRequest, _response: &mut CheckResponse) -> Outcome {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.outcome
		}

		fn name(&self) -> &'static str {
			"fixed"
		}
	}

	#[tokio::test]
	async fn empty_pipe_allows() {
		let pipe = Pipe::new();
		let mut response = CheckResponse::default();
		assert_eq!(
			pipe.process(&CheckRequest::default(), &mut response).await,
			Outcome::Ok
		);
	}

	#[tokio::test]
	async fn pipe_stops_at_first_non_ok() {
		let first = Arc::new(AtomicUsize::new(0));
		let last = Arc::new(AtomicUsize::new(0));
		let mut pipe = Pipe::new();
		pipe.add_filter(Box::new(FixedFilter::new(Outcome::Ok, first.clone())));
		pipe.add_filter(Box::new(FixedFilter::new(
			Outcome::Unauthenticated,
			Arc::new(AtomicUsize::new(0)),
		)));
		pipe.add_filter(Box::new(FixedFilter::new(Outcome::Ok, last.clone())));
		let mut response = CheckResponse::default();
		assert_eq!(
			pipe.process(&CheckRequest::default(), &mut response).await,
			Outcome::Unauthenticated
		);
		assert_eq!(first.load(Ordering::SeqCst), 1);
		assert_eq!(last.load(Ordering::SeqCst), 0);
	}
}
