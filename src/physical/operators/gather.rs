use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, bounded};

use crate::{
    config::EngineConfig,
    formats::TableFormat,
    physical::{ExecError, ExecutionContext, PhysicalOperator, RowSource, Tuple, TupleStream},
    query::Field,
};

/// Fans the subtree out over the source's splits. Each worker re-runs the
/// child with the scan path overridden to one split and feeds a shared
/// bounded channel, so row order across splits is arbitrary.
pub struct Gather {
    child: Arc<dyn PhysicalOperator>,
    path: String,
    format: Arc<dyn TableFormat>,
    config: EngineConfig,
}

impl Gather {
    pub fn new(
        child: Arc<dyn PhysicalOperator>,
        path: String,
        format: Arc<dyn TableFormat>,
        config: EngineConfig,
    ) -> Self {
        Self { child, path, format, config }
    }
}

impl PhysicalOperator for Gather {
    fn column_aliases(&self) -> &[Field] {
        self.child.column_aliases()
    }

    fn data(&self, ctx: &ExecutionContext) -> Result<TupleStream, ExecError> {
        let splits = self.format.splits(ctx.resolve(&self.path));
        if splits.len() <= 1 {
            return self.child.data(ctx);
        }

        let cores = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let workers = splits.len().min(cores * self.config.gather_workers_per_core).max(1);
        tracing::debug!(splits = splits.len(), workers, path = %self.path, "gathering");

        let (tx, rx) = bounded::<Tuple>(self.config.gather_queue_size);
        let queue = Arc::new(Mutex::new(splits));
        let errors: Arc<Mutex<Vec<ExecError>>> = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));

        let handles = (0..workers)
            .map(|_| {
                let child = self.child.clone();
                let path = self.path.clone();
                let ctx = ctx.clone();
                let tx = tx.clone();
                let queue = queue.clone();
                let errors = errors.clone();
                let stop = stop.clone();
                thread::spawn(move || {
                    run_worker(child, &path, ctx, tx, queue, errors, stop);
                })
            })
            .collect();
        drop(tx);

        Ok(TupleStream::new(Box::new(GatherSource {
            rx: Some(rx),
            handles,
            errors,
            stop,
        })))
    }

    fn describe(&self) -> String {
        format!("Gather path={}", self.path)
    }

    fn children(&self) -> Vec<&dyn PhysicalOperator> {
        vec![self.child.as_ref()]
    }
}

fn run_worker(
    child: Arc<dyn PhysicalOperator>,
    path: &str,
    ctx: ExecutionContext,
    tx: Sender<Tuple>,
    queue: Arc<Mutex<Vec<String>>>,
    errors: Arc<Mutex<Vec<ExecError>>>,
    stop: Arc<AtomicBool>,
) {
    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let Some(split) = queue.lock().unwrap().pop() else { return };
        let split_ctx = ctx.clone().with_override(path, &split);
        let stream = match child.data(&split_ctx) {
            Ok(stream) => stream,
            Err(err) => {
                errors.lock().unwrap().push(err);
                return;
            }
        };
        for row in stream {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            match row {
                Ok(tuple) => {
                    // Fails only when the consumer dropped the receiver.
                    if tx.send(tuple).is_err() {
                        return;
                    }
                }
                Err(err) => {
                    errors.lock().unwrap().push(err);
                    return;
                }
            }
        }
    }
}

struct GatherSource {
    rx: Option<Receiver<Tuple>>,
    handles: Vec<JoinHandle<()>>,
    errors: Arc<Mutex<Vec<ExecError>>>,
    stop: Arc<AtomicBool>,
}

impl GatherSource {
    fn finish(&mut self) -> Result<Option<Tuple>, ExecError> {
        self.rx = None;
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        let errors = self.errors.lock().unwrap();
        match errors.first() {
            Some(err) => Err(ExecError::Worker(err.to_string())),
            None => Ok(None),
        }
    }
}

impl RowSource for GatherSource {
    fn next_tuple(&mut self) -> Result<Option<Tuple>, ExecError> {
        loop {
            let Some(rx) = &self.rx else { return Ok(None) };
            match rx.recv_timeout(Duration::from_millis(10)) {
                Ok(tuple) => return Ok(Some(tuple)),
                Err(RecvTimeoutError::Timeout) => {
                    if self.handles.iter().all(|handle| handle.is_finished()) {
                        // Workers are gone; take whatever queued up, then settle.
                        if let Ok(tuple) = rx.try_recv() {
                            return Ok(Some(tuple));
                        }
                        return self.finish();
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return self.finish(),
            }
        }
    }

    fn close(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.rx = None;
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
