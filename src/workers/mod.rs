//! Background reconcilers. Each worker owns a periodic tokio task that is
//! started and stopped explicitly by the application lifecycle; both stop
//! promptly on the shared shutdown signal.

pub mod order_cleanup;
pub mod pi_reconcile;

pub use order_cleanup::StuckOrderWorker;
pub use pi_reconcile::PiReconcileWorker;
