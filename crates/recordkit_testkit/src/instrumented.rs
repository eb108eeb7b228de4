//! Counting and fault-injecting connection wrapper.
//!
//! [`InstrumentedFactory`] wraps any factory. Every connection it hands out
//! reports its driver calls to a shared [`Probe`], which can also arm a
//! one-shot failure for the next begin, commit or execute.

use recordkit_driver::{
    Binding, Connection, ConnectionFactory, DriverError, DriverResult, Row, StatementId,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared counters and armed failures.
#[derive(Debug, Default)]
pub struct Probe {
    connects: AtomicUsize,
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    prepares: AtomicUsize,
    executes: AtomicUsize,
    closes: AtomicUsize,
    fail_begin: AtomicBool,
    fail_commit: AtomicBool,
    fail_execute: AtomicBool,
    fail_rollback: AtomicBool,
}

impl Probe {
    /// Connections opened.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Physical transactions begun.
    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    /// Successful commits.
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Rollbacks issued.
    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    /// Statements prepared.
    pub fn prepares(&self) -> usize {
        self.prepares.load(Ordering::SeqCst)
    }

    /// Statements executed.
    pub fn executes(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
    }

    /// Connections closed.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Makes the next `begin` fail.
    pub fn fail_next_begin(&self) {
        self.fail_begin.store(true, Ordering::SeqCst);
    }

    /// Makes the next `commit` fail without committing.
    pub fn fail_next_commit(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }

    /// Makes the next `rollback` fail without rolling back.
    pub fn fail_next_rollback(&self) {
        self.fail_rollback.store(true, Ordering::SeqCst);
    }

    /// Makes the next `execute` fail without executing.
    pub fn fail_next_execute(&self) {
        self.fail_execute.store(true, Ordering::SeqCst);
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn tripped(flag: &AtomicBool) -> bool {
        flag.swap(false, Ordering::SeqCst)
    }
}

/// A factory whose connections report to a [`Probe`].
pub struct InstrumentedFactory<F> {
    inner: F,
    probe: Arc<Probe>,
}

impl<F: ConnectionFactory> InstrumentedFactory<F> {
    /// Wraps `inner`.
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            probe: Arc::new(Probe::default()),
        }
    }

    /// The probe shared by every connection of this factory.
    pub fn probe(&self) -> Arc<Probe> {
        Arc::clone(&self.probe)
    }
}

impl<F: ConnectionFactory> ConnectionFactory for InstrumentedFactory<F> {
    fn connect(&self) -> DriverResult<Box<dyn Connection>> {
        let inner = self.inner.connect()?;
        Probe::bump(&self.probe.connects);
        Ok(Box::new(InstrumentedConnection {
            inner,
            probe: Arc::clone(&self.probe),
        }))
    }
}

/// A connection that reports to a [`Probe`].
pub struct InstrumentedConnection {
    inner: Box<dyn Connection>,
    probe: Arc<Probe>,
}

impl Connection for InstrumentedConnection {
    fn id(&self) -> u64 {
        self.inner.id()
    }

    fn begin(&mut self) -> DriverResult<()> {
        if Probe::tripped(&self.probe.fail_begin) {
            return Err(DriverError::injected("begin"));
        }
        self.inner.begin()?;
        Probe::bump(&self.probe.begins);
        Ok(())
    }

    fn commit(&mut self) -> DriverResult<()> {
        if Probe::tripped(&self.probe.fail_commit) {
            return Err(DriverError::injected("commit"));
        }
        self.inner.commit()?;
        Probe::bump(&self.probe.commits);
        Ok(())
    }

    fn rollback(&mut self) -> DriverResult<()> {
        if Probe::tripped(&self.probe.fail_rollback) {
            return Err(DriverError::injected("rollback"));
        }
        Probe::bump(&self.probe.rollbacks);
        self.inner.rollback()
    }

    fn prepare(&mut self, sql: &str) -> DriverResult<StatementId> {
        Probe::bump(&self.probe.prepares);
        self.inner.prepare(sql)
    }

    fn execute(&mut self, statement: StatementId, bindings: &[Binding]) -> DriverResult<Vec<Row>> {
        if Probe::tripped(&self.probe.fail_execute) {
            return Err(DriverError::injected("execute"));
        }
        Probe::bump(&self.probe.executes);
        self.inner.execute(statement, bindings)
    }

    fn last_insert_id(&self) -> DriverResult<i64> {
        self.inner.last_insert_id()
    }

    fn close(self: Box<Self>) -> DriverResult<()> {
        Probe::bump(&self.probe.closes);
        self.inner.close()
    }
}
