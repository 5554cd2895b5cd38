//! Session
//!
//! A session owns one script thread. The thread holds the [`ScriptHost`]
//! and runs jobs from a channel in order, sleeping until the next timer or
//! animation frame when idle. Callers submit a job and block on its reply
//! with a timeout; XHR completions come back through the same channel.
//!
//! Change tracking runs on the caller: it drains the mutation queue until
//! it stays quiet for `idle_timeout`, executing connected `<script>`
//! elements as they gain a body. Each script element runs once.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use hdom_dom::{queue, Mutation, MutationReceiver, MutationSender, NodeId};
use hdom_js::{Callbacks, JsError, Scheduler, ScriptHost, Task, XhrRequest};
use smol::channel::{self, Receiver, Sender};
use smol::future::FutureExt;
use smol::Timer;

use crate::config::Config;
use crate::error::SessionError;
use crate::path::DocPath;

type SlotJob = Box<dyn FnOnce(&mut Option<ScriptHost>) + Send>;

enum Job {
    /// Runs with access to the (possibly missing) host
    Slot(SlotJob),
    /// Submitted by the host itself, dropped if the host is gone
    Host(Task),
    Shutdown,
}

struct Worker {
    jobs: Sender<Job>,
    stopping: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

/// One page, one script thread
pub struct Session {
    html: String,
    config: Config,
    callbacks: Callbacks,
    worker: Option<Worker>,
    mutations: Option<MutationReceiver>,
    mutation_tx: Option<MutationSender>,
    /// Script elements of the current document that already ran
    executed: Mutex<HashSet<NodeId>>,
}

impl Session {
    /// A stopped session for `html`; the document is parsed by the first
    /// initial [`exec`](Self::exec)
    pub fn new(html: impl Into<String>, config: Config, callbacks: Callbacks) -> Self {
        Self {
            html: html.into(),
            config,
            callbacks,
            worker: None,
            mutations: None,
            mutation_tx: None,
            executed: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Spawn the script thread
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.worker.is_some() {
            return Ok(());
        }
        // fail early on a bad origin instead of on the first exec
        self.config.origin_url()?;
        let (tx, rx) = queue(self.config.mutation_capacity);
        let (jobs, inbox) = channel::unbounded();
        let stopping = Arc::new(AtomicBool::new(false));
        let flag = stopping.clone();
        let thread = thread::Builder::new()
            .name("hdom-script".into())
            .spawn(move || run_worker(inbox, flag))
            .map_err(|err| SessionError::Config(format!("spawn script thread: {err}")))?;
        tracing::info!("session started");
        self.worker = Some(Worker {
            jobs,
            stopping,
            thread: Some(thread),
        });
        self.mutations = Some(rx);
        self.mutation_tx = Some(tx);
        Ok(())
    }

    /// Stop the script thread and discard queued mutations
    pub fn stop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.stopping.store(true, Ordering::SeqCst);
            let _ = worker.jobs.try_send(Job::Shutdown);
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    tracing::error!("script thread panicked");
                }
            }
        }
        if let Some(mutations) = self.mutations.take() {
            let dropped = mutations.drain();
            if dropped > 0 {
                tracing::debug!("stop: discarded {} mutations", dropped);
            }
        }
        self.mutation_tx = None;
        self.executed_scripts().clear();
        tracing::info!("session stopped");
    }

    /// Run `script` on the script thread and return its completion value.
    /// With `initial` set, the document is (re)parsed and the window
    /// installed first.
    pub fn exec(&self, script: &str, initial: bool) -> Result<String, SessionError> {
        let source = strip_comment_markers(script);
        if initial {
            let html = self.html.clone();
            let options = self.config.host_options()?;
            let callbacks = self.callbacks.clone();
            let mutations = self.mutation_tx.clone().ok_or(SessionError::NotStarted)?;
            let scheduler = self.scheduler()?;
            // a fresh document reuses node ids
            self.executed_scripts().clear();
            return self.call(move |slot| {
                tracing::debug!("exec: init vm");
                *slot = None;
                let host = slot.insert(ScriptHost::new(&html, options, callbacks, mutations, scheduler)?);
                Ok(host.eval(&source)?)
            });
        }
        self.with_host(move |host| Ok(host.eval(&source)?))
    }

    /// Fire the document load events
    pub fn close_doc(&self) -> Result<(), SessionError> {
        tracing::debug!("close doc");
        self.with_host(|host| Ok(host.close_document()?))
    }

    /// Click the first element matching `selector` and collect the
    /// resulting document if the click was consumed
    pub fn trigger_click(&self, selector: &str) -> Result<Option<String>, SessionError> {
        let sel = selector.to_string();
        let consumed = self.with_host(move |host| Ok(host.click(&sel)?))?;
        match consumed {
            None => Err(SessionError::NoMatch(selector.to_string())),
            Some(true) => {
                tracing::debug!("event consumed");
                self.track_changes()
            }
            Some(false) => {
                tracing::debug!("event not consumed");
                Ok(None)
            }
        }
    }

    /// Set an attribute on the first element matching `selector`
    pub fn put_attr(&self, selector: &str, attr: &str, value: &str) -> Result<bool, SessionError> {
        let (sel, attr, value) = (selector.to_string(), attr.to_string(), value.to_string());
        self.with_host(move |host| Ok(host.put_attr(&sel, &attr, &value)?))
    }

    /// Drain mutations until none arrive for `idle_timeout`. Returns the
    /// rendered document if anything changed.
    pub fn track_changes(&self) -> Result<Option<String>, SessionError> {
        let mutations = self.mutations.as_ref().ok_or(SessionError::NotStarted)?;
        let mut changed = false;
        let mut halted = false;
        while let Some(mutation) = mutations.pop_timeout(self.config.idle_timeout) {
            changed = true;
            if halted || !mutation.connected || !mutation.is_script() {
                continue;
            }
            if let Err(err) = self.run_injected(&mutation) {
                if err.is_halted() {
                    tracing::info!("execution halted");
                    halted = true;
                } else {
                    tracing::warn!("exec injected <script>: {}", err);
                }
            }
        }
        tracing::debug!("track changes: changed = {}", changed);
        if !changed {
            return Ok(None);
        }
        self.render().map(Some)
    }

    /// HTML of the document element
    pub fn render(&self) -> Result<String, SessionError> {
        self.with_host(|host| Ok(host.render()))
    }

    /// Read the value at `path` as a string
    pub fn retrieve(&self, path: &str) -> Result<String, SessionError> {
        let path = DocPath::parse(path)?;
        self.exec(&path.retrieve_script(), false)
    }

    /// Assign `value` to the property at `path`
    pub fn write(&self, path: &str, value: &str) -> Result<(), SessionError> {
        let script = DocPath::parse(path)?.write_script(value)?;
        self.exec(&script, false).map(|_| ())
    }

    /// Child indices, properties and `method()` names at `path`
    pub fn list(&self, path: &str) -> Result<Vec<String>, SessionError> {
        let path = DocPath::parse(path)?;
        let listing = self.exec(&path.list_script(), false)?;
        Ok(listing.lines().filter(|l| !l.is_empty()).map(str::to_string).collect())
    }

    /// Run a script element the first time a mutation shows it with a
    /// `src` or a non-blank body
    fn run_injected(&self, mutation: &Mutation) -> Result<(), SessionError> {
        let inline = mutation.inner_html.as_deref().filter(|s| !s.trim().is_empty());
        let src = mutation.attr("src");
        if src.is_none() && inline.is_none() {
            return Ok(());
        }
        if !self.executed_scripts().insert(mutation.node) {
            tracing::trace!("<script> {:?} already ran", mutation.node);
            return Ok(());
        }
        let source = match src {
            Some(src) => {
                tracing::debug!("<script> GET {}", src);
                self.fetch_script(src)
            }
            None => inline.unwrap_or_default().to_string(),
        };
        if source.trim().is_empty() {
            return Ok(());
        }
        self.exec(&source, false).map(|_| ())
    }

    fn executed_scripts(&self) -> MutexGuard<'_, HashSet<NodeId>> {
        self.executed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fetch_script(&self, src: &str) -> String {
        let Some(transport) = self.callbacks.xhr.as_ref() else {
            tracing::warn!("<script src={}>: no HTTP transport", src);
            return String::new();
        };
        match transport(XhrRequest::new("GET", src)) {
            Ok(response) => response.body,
            Err(err) => {
                tracing::warn!("xhr {}: {:#}", src, err);
                String::new()
            }
        }
    }

    fn scheduler(&self) -> Result<Scheduler, SessionError> {
        let jobs = self.worker.as_ref().ok_or(SessionError::NotStarted)?.jobs.clone();
        Ok(Arc::new(move |task: Task| {
            if jobs.try_send(Job::Host(task)).is_err() {
                tracing::debug!("script thread gone, dropping task");
            }
        }))
    }

    fn with_host<R: Send + 'static>(
        &self,
        f: impl FnOnce(&mut ScriptHost) -> Result<R, SessionError> + Send + 'static,
    ) -> Result<R, SessionError> {
        self.call(move |slot| match slot.as_mut() {
            Some(host) => f(host),
            None => Err(JsError::NotInitialized.into()),
        })
    }

    /// Submit a job and wait up to `exec_timeout` for its reply
    fn call<R: Send + 'static>(
        &self,
        f: impl FnOnce(&mut Option<ScriptHost>) -> Result<R, SessionError> + Send + 'static,
    ) -> Result<R, SessionError> {
        let worker = self.worker.as_ref().ok_or(SessionError::NotStarted)?;
        let (reply, response) = channel::bounded(1);
        let job: SlotJob = Box::new(move |slot| {
            let _ = reply.try_send(f(slot));
        });
        worker
            .jobs
            .try_send(Job::Slot(job))
            .map_err(|_| SessionError::WorkerGone)?;
        let timeout = self.config.exec_timeout;
        smol::block_on(
            async {
                match response.recv().await {
                    Ok(result) => result,
                    Err(_) => Err(SessionError::WorkerGone),
                }
            }
            .or(async {
                Timer::after(timeout).await;
                Err(SessionError::Timeout(timeout))
            }),
        )
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}

fn run_worker(inbox: Receiver<Job>, stopping: Arc<AtomicBool>) {
    let mut slot: Option<ScriptHost> = None;
    loop {
        // a busy inbox must not starve due timers
        if let Some(host) = slot.as_mut() {
            let now = Instant::now();
            if host.next_deadline().is_some_and(|at| at <= now) {
                fire_due(host, now);
            }
        }
        let deadline = slot.as_ref().and_then(ScriptHost::next_deadline);
        let next = smol::block_on(async {
            let job = async { Some(inbox.recv().await) };
            match deadline {
                Some(at) => {
                    job.or(async {
                        Timer::at(at).await;
                        None
                    })
                    .await
                }
                None => job.await,
            }
        });
        let job = match next {
            None => {
                if let Some(host) = slot.as_mut() {
                    fire_due(host, Instant::now());
                }
                continue;
            }
            Some(Ok(Job::Shutdown)) | Some(Err(_)) => break,
            Some(Ok(job)) => job,
        };
        if stopping.load(Ordering::SeqCst) {
            break;
        }
        match job {
            Job::Slot(run) => run(&mut slot),
            Job::Host(task) => match slot.as_mut() {
                Some(host) => task(host),
                None => tracing::debug!("no script host, dropping task"),
            },
            Job::Shutdown => break,
        }
    }
    tracing::debug!("script thread exiting");
}

fn fire_due(host: &mut ScriptHost, now: Instant) {
    if let Err(err) = host.run_timers(now) {
        tracing::warn!("timers: {}", err);
    }
    if let Err(err) = host.run_animation_frame(now) {
        tracing::warn!("animation frame: {}", err);
    }
}

/// Replace a leading `<!--` and a trailing `-->` with line comments
fn strip_comment_markers(script: &str) -> String {
    let mut s = script.to_string();
    let start = s.len() - s.trim_start().len();
    if s[start..].starts_with("<!--") {
        s.replace_range(start..start + 4, "//");
    }
    let end = s.trim_end().len();
    if s[..end].ends_with("-->") {
        s.replace_range(end - 3..end, "//");
    }
    s
}
