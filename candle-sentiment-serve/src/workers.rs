use std::{collections::VecDeque, sync::Arc};

use tokio::sync::{mpsc, oneshot};

/// Task for the inference worker.
pub(crate) struct InferenceTask<I, O> {
    /// The request to process.
    pub req: I,
    /// The response sender.
    pub resp_tx: oneshot::Sender<O>,
}

/// State for the inference task.
pub(crate) struct InferenceState<I, O> {
    pub tx: mpsc::Sender<InferenceTask<I, O>>,
}

impl<I, O> Clone for InferenceState<I, O> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

/// Function signature for processing inference tasks.
pub(crate) type ProcessFn<P, I, O> = dyn Fn(&P, I) -> O + Send + Sync;

/// Distributes inference tasks to worker tasks in arrival order. Every worker processes one task
/// at a time on the blocking thread pool.
///
/// # Arguments
///
/// * `rx` - Receiver for incoming inference tasks.
/// * `pipeline` - The state shared by the workers to process the tasks.
/// * `num_workers` - The number of worker tasks to spawn.
/// * `process_fn` - The function that processes the inference task.
pub(crate) async fn task_distributor<P, I, O>(
    mut rx: mpsc::Receiver<InferenceTask<I, O>>,
    pipeline: Arc<P>,
    num_workers: usize,
    process_fn: Arc<ProcessFn<P, I, O>>,
) where
    P: Send + Sync + ?Sized + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    tracing::info!("Starting task distributor with {} workers", num_workers);
    let mut workers = Vec::new();
    let (worker_tx, mut worker_rx) = mpsc::channel(num_workers.max(1));

    for id in 0..num_workers {
        let handle = tokio::spawn(worker_loop(
            id,
            Arc::clone(&pipeline),
            worker_tx.clone(),
            Arc::clone(&process_fn),
        ));
        workers.push(handle);
    }
    drop(worker_tx);

    let mut tasks: VecDeque<InferenceTask<I, O>> = VecDeque::new();
    let mut available_workers: Vec<mpsc::Sender<InferenceTask<I, O>>> = Vec::new();

    loop {
        tokio::select! {
            task = rx.recv() => {
                match task {
                    Some(task) => {
                        if let Some(worker) = available_workers.pop() {
                            if worker.send(task).await.is_err() {
                                tracing::error!("Failed to send task to worker");
                            }
                        } else {
                            tasks.push_back(task);
                        }
                    }
                    // Channel closed, no more tasks will be coming
                    None => break,
                }
            }
            worker = worker_rx.recv() => {
                match worker {
                    Some(worker) => {
                        if let Some(task) = tasks.pop_front() {
                            if worker.send(task).await.is_err() {
                                tracing::error!("Failed to send task to worker");
                            }
                        } else {
                            available_workers.push(worker);
                        }
                    }
                    // All workers have exited
                    None => break,
                }
            }
        }
    }

    // Dropping the idle senders lets the workers exit
    drop(available_workers);
    drop(worker_rx);
    for worker in workers {
        if let Err(e) = worker.await {
            tracing::error!("Worker task failed: {}", e);
        }
    }
    tracing::info!("Task distributor stopped");
}

/// Worker task that processes inference tasks using the provided function.
///
/// # Arguments
///
/// * `id` - Worker task identifier.
/// * `pipeline` - The state shared by the workers to process the tasks.
/// * `worker_tx` - Sender to communicate with the task distributor.
/// * `process_fn` - The function that processes the inference task.
async fn worker_loop<P, I, O>(
    id: usize,
    pipeline: Arc<P>,
    worker_tx: mpsc::Sender<mpsc::Sender<InferenceTask<I, O>>>,
    process_fn: Arc<ProcessFn<P, I, O>>,
) where
    P: Send + Sync + ?Sized + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    let (task_tx, mut task_rx) = mpsc::channel(1);

    loop {
        if worker_tx.send(task_tx.clone()).await.is_err() {
            break;
        }

        let Some(task) = task_rx.recv().await else {
            break;
        };

        let pipeline = Arc::clone(&pipeline);
        let process_fn = Arc::clone(&process_fn);
        let req = task.req;
        match tokio::task::spawn_blocking(move || process_fn(pipeline.as_ref(), req)).await {
            Ok(result) => {
                if task.resp_tx.send(result).is_err() {
                    tracing::error!("Failed to send response from worker {}", id);
                }
            }
            Err(e) => tracing::error!("Inference failed on worker {}: {}", id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type Log = Mutex<Vec<usize>>;

    fn spawn_distributor(num_workers: usize) -> (InferenceState<usize, usize>, Arc<Log>) {
        let log = Arc::new(Log::default());
        let (tx, rx) = mpsc::channel::<InferenceTask<usize, usize>>(32);
        let process_fn = Arc::new(|log: &Log, value: usize| {
            log.lock().unwrap().push(value);
            value * 2
        }) as Arc<ProcessFn<Log, usize, usize>>;
        tokio::spawn(task_distributor(rx, Arc::clone(&log), num_workers, process_fn));
        (InferenceState { tx }, log)
    }

    async fn submit(state: &InferenceState<usize, usize>, req: usize) -> oneshot::Receiver<usize> {
        let (resp_tx, resp_rx) = oneshot::channel();
        state
            .tx
            .send(InferenceTask { req, resp_tx })
            .await
            .unwrap();
        resp_rx
    }

    #[tokio::test]
    async fn test_single_worker_processes_in_arrival_order() {
        let (state, log) = spawn_distributor(1);
        let mut receivers = Vec::new();
        for value in 0..5 {
            receivers.push(submit(&state, value).await);
        }
        let mut responses = Vec::new();
        for rx in receivers {
            responses.push(rx.await.unwrap());
        }
        assert_eq!(responses, vec![0, 2, 4, 6, 8]);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_multiple_workers_answer_every_task() {
        let (state, log) = spawn_distributor(3);
        let mut receivers = Vec::new();
        for value in 0..10 {
            receivers.push(submit(&state, value).await);
        }
        for (value, rx) in receivers.into_iter().enumerate() {
            assert_eq!(rx.await.unwrap(), value * 2);
        }
        assert_eq!(log.lock().unwrap().len(), 10);
    }
}
