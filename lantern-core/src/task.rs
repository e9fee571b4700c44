//! Main-thread tasks.
//!
//! The timeline of the main thread is a forest: a top level task (one
//! turn of the event loop) contains nested events such as script
//! evaluation, layout or a network request being issued. [`Task::forest`]
//! nests flat [`TaskEvent`]s by time containment, each [`Task`] then
//! carries what its whole subtree touched so the graph builder never has
//! to walk it again.

use crate::defaults::SIGNIFICANT_CPU_TASK_DURATION;
use std::{collections::BTreeSet, time::Duration};

pub const EVALUATE_SCRIPT: &str = "EvaluateScript";
pub const FUNCTION_CALL: &str = "FunctionCall";
pub const V8_COMPILE: &str = "v8.compile";
pub const PARSE_HTML: &str = "ParseHTML";
pub const LAYOUT: &str = "Layout";
pub const TIMER_INSTALL: &str = "TimerInstall";
pub const TIMER_FIRE: &str = "TimerFire";
pub const RESOURCE_SEND_REQUEST: &str = "ResourceSendRequest";

/// One complete event of the main thread, before nesting.
///
/// The trace normalizer extracts the fields from the event arguments;
/// tests usually build them by hand with [`TaskEvent::new`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskEvent {
    pub name: String,
    pub start: Duration,
    pub duration: Duration,
    /// the script, stylesheet or document the event works on
    pub url: Option<String>,
    pub stack_urls: Vec<String>,
    /// set on `ResourceSendRequest`
    pub request_id: Option<String>,
    /// set on `TimerInstall` and `TimerFire`
    pub timer_id: Option<String>,
}

impl TaskEvent {
    pub fn new(name: impl Into<String>, start: Duration, duration: Duration) -> Self {
        Self {
            name: name.into(),
            start,
            duration,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    #[must_use]
    pub fn with_timer_id(mut self, timer_id: impl Into<String>) -> Self {
        self.timer_id = Some(timer_id.into());
        self
    }

    #[inline]
    pub fn end(&self) -> Duration {
        self.start + self.duration
    }
}

/// A main-thread task and everything nested in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Task {
    /// position of the task in a pre-order walk of the forest
    pub id: usize,
    pub name: String,
    pub start: Duration,
    pub duration: Duration,
    /// duration minus the time spent in children
    pub self_time: Duration,
    /// first URL found in the task or its call stack, descendants are
    /// searched pre-order
    pub attributable_url: Option<String>,
    pub children: Vec<Task>,

    /// every script, stylesheet or document URL touched by the subtree
    pub urls: Vec<String>,
    /// ids of the requests issued from the subtree
    pub sent_request_ids: Vec<String>,
    pub timers_installed: Vec<String>,
    pub timers_fired: Vec<String>,
    pub performs_layout: bool,
    pub parses_html: bool,
    pub evaluates_script: bool,
}

struct Pending {
    event: TaskEvent,
    children: Vec<Task>,
}

impl Task {
    /// Nest `events` by time containment and return the top level tasks
    /// ordered by start time.
    ///
    /// An event that starts inside another one but outlives it is cut
    /// at its parent's end.
    pub fn forest(mut events: Vec<TaskEvent>) -> Vec<Task> {
        // parents first: earliest start then longest duration
        events.sort_by(|a, b| a.start.cmp(&b.start).then(b.duration.cmp(&a.duration)));

        let mut roots = Vec::new();
        let mut stack: Vec<Pending> = Vec::new();

        for mut event in events {
            while let Some(top) = stack.last() {
                if event.start < top.event.end() {
                    break;
                }
                close(&mut stack, &mut roots);
            }

            if let Some(parent) = stack.last()
                && event.end() > parent.event.end()
            {
                tracing::trace!(
                    name = %event.name,
                    start = ?event.start,
                    "event outlives its parent, truncating"
                );
                event.duration = parent.event.end() - event.start;
            }

            stack.push(Pending {
                event,
                children: Vec::new(),
            });
        }
        while !stack.is_empty() {
            close(&mut stack, &mut roots);
        }

        let mut next_id = 0;
        for root in roots.iter_mut() {
            root.assign_ids(&mut next_id);
        }
        roots
    }

    fn new(event: TaskEvent, children: Vec<Task>) -> Self {
        let children_time: Duration = children.iter().map(|child| child.duration).sum();
        let self_time = event.duration.saturating_sub(children_time);

        let mut seen = BTreeSet::new();
        let mut urls = Vec::new();
        let own = event.url.iter().chain(event.stack_urls.iter());
        let nested = children.iter().flat_map(|child| child.urls.iter());
        for url in own.chain(nested) {
            if !url.is_empty() && seen.insert(url.as_str()) {
                urls.push(url.clone());
            }
        }

        let mut sent_request_ids: Vec<String> = Vec::new();
        let mut timers_installed: Vec<String> = Vec::new();
        let mut timers_fired: Vec<String> = Vec::new();
        match event.name.as_str() {
            RESOURCE_SEND_REQUEST => sent_request_ids.extend(event.request_id.clone()),
            TIMER_INSTALL => timers_installed.extend(event.timer_id.clone()),
            TIMER_FIRE => timers_fired.extend(event.timer_id.clone()),
            _ => {}
        }
        for child in &children {
            sent_request_ids.extend(child.sent_request_ids.iter().cloned());
            timers_installed.extend(child.timers_installed.iter().cloned());
            timers_fired.extend(child.timers_fired.iter().cloned());
        }

        let name = event.name.as_str();
        let performs_layout = name == LAYOUT || children.iter().any(|c| c.performs_layout);
        let parses_html = name == PARSE_HTML || children.iter().any(|c| c.parses_html);
        let evaluates_script = matches!(name, EVALUATE_SCRIPT | FUNCTION_CALL | V8_COMPILE)
            || children.iter().any(|c| c.evaluates_script);

        Self {
            id: 0,
            attributable_url: urls.first().cloned(),
            name: event.name,
            start: event.start,
            duration: event.duration,
            self_time,
            children,
            urls,
            sent_request_ids,
            timers_installed,
            timers_fired,
            performs_layout,
            parses_html,
            evaluates_script,
        }
    }

    fn assign_ids(&mut self, next: &mut usize) {
        self.id = *next;
        *next += 1;
        for child in self.children.iter_mut() {
            child.assign_ids(next);
        }
    }

    #[inline]
    pub fn end(&self) -> Duration {
        self.start + self.duration
    }

    /// `true` when the task deserves its own node in the dependency
    /// graph: it is long enough, or it runs script, fires a timer or
    /// parses HTML.
    pub fn is_significant(&self) -> bool {
        self.duration >= SIGNIFICANT_CPU_TASK_DURATION
            || self.evaluates_script
            || self.parses_html
            || !self.timers_fired.is_empty()
    }

    /// Pre-order walk of the subtree, this task included.
    pub fn descendants(&self) -> impl Iterator<Item = &Task> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let task = stack.pop()?;
            stack.extend(task.children.iter().rev());
            Some(task)
        })
    }
}

fn close(stack: &mut Vec<Pending>, roots: &mut Vec<Task>) {
    let Some(Pending { event, children }) = stack.pop() else {
        return;
    };
    let task = Task::new(event, children);
    match stack.last_mut() {
        Some(parent) => parent.children.push(task),
        None => roots.push(task),
    }
}
