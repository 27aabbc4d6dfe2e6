//! Rewrites one config map in every namespace where it exists.
//!
//! The update is a full overwrite of the `data` mapping: keys not present in
//! the new data are removed. Each namespace is handled independently and a
//! failure in one of them never stops the others; the caller gets a
//! [`ReconcileReport`] with one entry per namespace.

use std::{
	collections::BTreeMap,
	fmt,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
};

use futures::{stream, StreamExt};
use thiserror::Error;
use tracing::instrument;

use crate::k8s::fetch::{ClusterApi, FetchError};

/// Errors that abort a whole reconcile run.
#[derive(Debug, Error)]
pub enum ReconcileError {
	#[error("enumerating namespaces")]
	NamespaceEnumeration(#[source] FetchError),
}

/// Why a single namespace could not be updated.
#[derive(Debug, Error)]
pub enum OutcomeError {
	#[error("reading config map")]
	ReadFailed(#[source] FetchError),

	#[error("replacing config map data")]
	WriteFailed(#[source] FetchError),
}

/// What happened in one namespace.
#[derive(Debug)]
pub enum Outcome {
	/// The config map existed and its data was replaced.
	Updated,

	/// No config map with that name in the namespace.
	Skipped,

	Failed(OutcomeError),

	/// The run was cancelled before this namespace was attempted.
	Cancelled,
}

impl Outcome {
	pub fn label(&self) -> &'static str {
		match self {
			Outcome::Updated => "updated",
			Outcome::Skipped => "skipped",
			Outcome::Failed(_) => "failed",
			Outcome::Cancelled => "cancelled",
		}
	}

	pub fn is_failed(&self) -> bool {
		matches!(self, Outcome::Failed(_))
	}
}

impl fmt::Display for Outcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

#[derive(Debug)]
pub struct NamespaceOutcome {
	pub namespace: String,
	pub outcome: Outcome,
}

/// Overall classification of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileSummary {
	/// No namespace holds the config map.
	NothingToUpdate,
	/// Every copy was updated.
	UpdatedEverywhere,
	/// Some copies were updated, others failed.
	PartiallyFailed,
	/// Every attempted copy failed.
	AllFailed,
	/// The run stopped before reaching every namespace.
	Cancelled,
}

impl fmt::Display for ReconcileSummary {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ReconcileSummary::NothingToUpdate => write!(f, "nothing to update"),
			ReconcileSummary::UpdatedEverywhere => write!(f, "updated everywhere it existed"),
			ReconcileSummary::PartiallyFailed => write!(f, "updated some namespaces, failed others"),
			ReconcileSummary::AllFailed => write!(f, "failed everywhere it existed"),
			ReconcileSummary::Cancelled => write!(f, "cancelled"),
		}
	}
}

/// Per-namespace outcomes of one update, in namespace listing order.
#[derive(Debug, Default)]
pub struct ReconcileReport {
	name: String,
	entries: Vec<NamespaceOutcome>,
}

impl ReconcileReport {
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn entries(&self) -> &[NamespaceOutcome] {
		&self.entries
	}

	fn namespaces_where(&self, pred: impl Fn(&Outcome) -> bool) -> Vec<&str> {
		self.entries
			.iter()
			.filter(|e| pred(&e.outcome))
			.map(|e| e.namespace.as_str())
			.collect()
	}

	pub fn updated(&self) -> Vec<&str> {
		self.namespaces_where(|o| matches!(o, Outcome::Updated))
	}

	pub fn skipped(&self) -> Vec<&str> {
		self.namespaces_where(|o| matches!(o, Outcome::Skipped))
	}

	pub fn failed(&self) -> Vec<&str> {
		self.namespaces_where(Outcome::is_failed)
	}

	pub fn cancelled(&self) -> Vec<&str> {
		self.namespaces_where(|o| matches!(o, Outcome::Cancelled))
	}

	pub fn summary(&self) -> ReconcileSummary {
		if !self.cancelled().is_empty() {
			return ReconcileSummary::Cancelled;
		}
		match (self.updated().len(), self.failed().len()) {
			(0, 0) => ReconcileSummary::NothingToUpdate,
			(_, 0) => ReconcileSummary::UpdatedEverywhere,
			(0, _) => ReconcileSummary::AllFailed,
			_ => ReconcileSummary::PartiallyFailed,
		}
	}

	/// True when nothing failed and the run was not cancelled.
	pub fn is_success(&self) -> bool {
		matches!(
			self.summary(),
			ReconcileSummary::NothingToUpdate | ReconcileSummary::UpdatedEverywhere
		)
	}
}

/// Shared flag used to stop a reconcile run early.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

/// Applies config map updates across namespaces.
pub struct Reconciler<'a, C: ?Sized> {
	api: &'a C,
	concurrency: usize,
	cancel: CancelFlag,
}

impl<'a, C: ClusterApi + ?Sized> Reconciler<'a, C> {
	pub fn new(api: &'a C) -> Self {
		Self {
			api,
			concurrency: 1,
			cancel: CancelFlag::default(),
		}
	}

	/// Number of namespaces processed at the same time. Clamped to at least 1.
	#[must_use]
	pub fn concurrency(mut self, concurrency: usize) -> Self {
		self.concurrency = concurrency.max(1);
		self
	}

	#[must_use]
	pub fn cancel_flag(mut self, cancel: CancelFlag) -> Self {
		self.cancel = cancel;
		self
	}

	/// Replace the data of config map `name` in every namespace holding one.
	///
	/// Fails only when the namespaces cannot be listed. Per-namespace read and
	/// write failures are recorded in the report.
	#[instrument(skip(self, data), fields(keys = data.len(), concurrency = self.concurrency))]
	pub async fn apply_config_update(
		&self,
		name: &str,
		data: &BTreeMap<String, String>,
	) -> Result<ReconcileReport, ReconcileError> {
		let namespaces: Vec<String> = self
			.api
			.list_namespaces()
			.await
			.map_err(ReconcileError::NamespaceEnumeration)?
			.into_iter()
			.filter_map(|ns| ns.metadata.name)
			.collect();

		tracing::debug!(count = namespaces.len(), "enumerated namespaces");

		// `buffered` yields results in input order whatever the completion order.
		let entries = stream::iter(namespaces)
			.map(|namespace| async move {
				let outcome = self.update_namespace(name, &namespace, data).await;
				NamespaceOutcome { namespace, outcome }
			})
			.buffered(self.concurrency)
			.collect::<Vec<_>>()
			.await;

		let report = ReconcileReport {
			name: name.to_string(),
			entries,
		};
		tracing::info!(
			updated = report.updated().len(),
			skipped = report.skipped().len(),
			failed = report.failed().len(),
			summary = %report.summary(),
			"config map update finished"
		);
		Ok(report)
	}

	#[instrument(skip(self, data))]
	async fn update_namespace(
		&self,
		name: &str,
		namespace: &str,
		data: &BTreeMap<String, String>,
	) -> Outcome {
		if self.cancel.is_cancelled() {
			return Outcome::Cancelled;
		}

		let current = match self.api.read_config_map(name, namespace).await {
			Ok(Some(current)) => current,
			Ok(None) => {
				tracing::debug!("no such config map, skipping");
				return Outcome::Skipped;
			}
			Err(e) => {
				tracing::warn!(error = %e, "reading config map failed");
				return Outcome::Failed(OutcomeError::ReadFailed(e));
			}
		};

		if self.cancel.is_cancelled() {
			return Outcome::Cancelled;
		}

		match self.api.replace_config_map(current, data).await {
			Ok(_) => {
				tracing::debug!("config map data replaced");
				Outcome::Updated
			}
			Err(e) => {
				tracing::warn!(error = %e, "replacing config map failed");
				Outcome::Failed(OutcomeError::WriteFailed(e))
			}
		}
	}
}
