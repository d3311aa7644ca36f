use std::{
    thread,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use threadpool::ThreadPool;


/// A job returns how long to wait before it runs again.
pub type FnTask = dyn Fn() -> Duration + Send + 'static;


pub struct Task {
    name: &'static str,
    job: Arc<Mutex<FnTask>>,
    next_time: Instant,
    running: bool,
}

impl Task {
    pub fn new<F>(name: &'static str, job: F, delay: Duration) -> Self where
        F: Fn() -> Duration + Send + 'static {

        Task {
            name,
            job: Arc::new(Mutex::new(job)),
            next_time: Instant::now() + delay,
            running: false,
        }
    }

    fn ready(&self) -> bool {
        !self.running && Instant::now() >= self.next_time
    }

    fn finish_job(&mut self, result: Duration) {
        self.next_time = Instant::now() + result;
        self.running = false;
    }

    fn mark_as_busy(&mut self) {
        self.running = true;
    }
}


pub struct TaskSchedulerBuilder {
    tasks: Vec<Arc<Mutex<Task>>>,
    n_workers: usize,
    period_resolution: Duration,
}

impl TaskSchedulerBuilder {
    pub fn new() -> Self {
        TaskSchedulerBuilder {
            tasks: Vec::new(),
            n_workers: 4,
            period_resolution: Duration::new(1, 0),
        }
    }

    pub fn n_workers(mut self, cnt: usize) -> Self {
        self.n_workers = cnt.max(1);
        self
    }

    pub fn period_resolution(mut self, period: Duration) -> Self {
        self.period_resolution = period;
        self
    }

    pub fn add_task(&mut self, task: Task) {
        self.tasks.push(Arc::new(Mutex::new(task)));
    }

    pub fn build(self) -> TaskScheduler {
        TaskScheduler::new(self)
    }
}


pub struct TaskScheduler {
    scheduler: Option<thread::JoinHandle<()>>,
    running: Arc<Mutex<bool>>,
}

impl TaskScheduler {
    fn new(builder: TaskSchedulerBuilder) -> Self {
        let tasks = builder.tasks;
        let n_workers = builder.n_workers;
        let period_resolution = builder.period_resolution;

        let running = Arc::new(Mutex::new(true));
        let t_running = running.clone();

        let scheduler_job = move || {
            let pool = ThreadPool::new(n_workers);

            while is_running(&t_running) {
                for m_task in &tasks {
                    let mut task = match m_task.lock() {
                        Ok(task) => task,
                        Err(_) => continue,
                    };

                    if task.ready() {
                        task.mark_as_busy();

                        let name = task.name;
                        let job = task.job.clone();
                        let t_task = m_task.clone();
                        pool.execute(move || {
                            debug!("Run task {}", name);

                            // A panicking job poisons its lock and is never run again.
                            let next_period = match job.lock() {
                                Ok(job) => (*job)(),
                                Err(_) => {
                                    error!("Task {} is poisoned", name);
                                    return;
                                },
                            };

                            if let Ok(mut task) = t_task.lock() {
                                task.finish_job(next_period);
                            }
                        });
                    }
                }

                thread::sleep(period_resolution);
            }

            pool.join();
        };

        TaskScheduler {
            scheduler: Some(thread::spawn(scheduler_job)),
            running,
        }
    }

    /// Stops scheduling and waits for running jobs.
    pub fn join(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Ok(mut running) = self.running.lock() {
            *running = false;
        }

        if let Some(handle) = self.scheduler.take() {
            if handle.join().is_err() {
                error!("The task scheduler thread panicked");
            }
        }
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn is_running(flag: &Mutex<bool>) -> bool {
    flag.lock().map(|running| *running).unwrap_or(false)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_due_tasks_repeatedly() {
        let counter = Arc::new(AtomicUsize::new(0));
        let t_counter = counter.clone();

        let mut builder = TaskSchedulerBuilder::new()
            .n_workers(1)
            .period_resolution(Duration::from_millis(5));
        builder.add_task(Task::new("count", move || {
            t_counter.fetch_add(1, Ordering::SeqCst);
            Duration::from_millis(5)
        }, Duration::from_millis(0)));

        let scheduler = builder.build();
        thread::sleep(Duration::from_millis(200));
        scheduler.join();

        assert!(counter.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn tasks_wait_for_their_delay() {
        let counter = Arc::new(AtomicUsize::new(0));
        let t_counter = counter.clone();

        let mut builder = TaskSchedulerBuilder::new()
            .period_resolution(Duration::from_millis(5));
        builder.add_task(Task::new("late", move || {
            t_counter.fetch_add(1, Ordering::SeqCst);
            Duration::new(60, 0)
        }, Duration::new(60, 0)));

        let scheduler = builder.build();
        thread::sleep(Duration::from_millis(50));
        scheduler.join();

        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
