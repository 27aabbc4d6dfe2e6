//! Utilities for command handlers.

use std::{
	io::{self, ErrorKind, Write},
	path::PathBuf,
};

use anyhow::{Context, Result};
use clap::Args;
use tracing::Level;

use crate::{
	config::{Overrides, Settings},
	k8s::client::{ClusterConnection, ConnectOptions},
};

/// Flags accepted by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
	/// Log level (overrides RUST_LOG)
	#[arg(long, global = true)]
	pub log_level: Option<Level>,

	/// Path to the kubeconfig file (defaults to $KUBECONFIG, then ~/.kube/config)
	#[arg(long, global = true)]
	pub kubeconfig: Option<PathBuf>,

	/// Kubeconfig context to use (defaults to the current context)
	#[arg(long, global = true)]
	pub context: Option<String>,
}

impl GlobalArgs {
	/// Connection flags as config overrides.
	pub fn overrides(&self) -> Overrides {
		Overrides {
			kubeconfig: self.kubeconfig.clone(),
			context: self.context.clone(),
			..Default::default()
		}
	}
}

/// Load settings from `.kubeman.yaml` with `overrides` applied on top.
pub fn load_settings(overrides: Overrides) -> Result<Settings> {
	Settings::load(overrides).context("loading configuration")
}

pub fn create_tokio_runtime() -> Result<tokio::runtime::Runtime> {
	tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()
		.context("creating tokio runtime")
}

/// Connect to the cluster described by `opts`.
pub async fn connect(opts: &ConnectOptions) -> Result<ClusterConnection> {
	tracing::debug!("connecting to Kubernetes cluster");
	let conn = ClusterConnection::connect(opts)
		.await
		.context("connecting to Kubernetes cluster")?;
	tracing::debug!(
		context = %conn.context(),
		server_version = %format!("{}.{}", conn.server_version().major, conn.server_version().minor),
		"connected to cluster"
	);
	Ok(conn)
}

/// A writer wrapper that silently handles broken pipe errors.
///
/// When the underlying writer returns a broken pipe error (EPIPE), this wrapper
/// converts it to a successful write. This allows commands to exit cleanly when
/// output is piped to a process that closes early (e.g., `kubeman workloads | head -1`).
pub struct BrokenPipeGuard<W> {
	inner: W,
}

impl<W> BrokenPipeGuard<W> {
	pub fn new(inner: W) -> Self {
		Self { inner }
	}
}

impl<W: Write> Write for BrokenPipeGuard<W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		match self.inner.write(buf) {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(buf.len()),
			other => other,
		}
	}

	fn flush(&mut self) -> io::Result<()> {
		match self.inner.flush() {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
			other => other,
		}
	}
}
