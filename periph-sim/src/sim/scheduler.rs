//! scheduler module
//! 
//! the discrete-event engine: owns simulated time and the pending event
//! set, hosts one peripheral model and the stimulus generator, and reports
//! each executed iteration to the output consumer
use std::cmp::{ Ordering, Reverse };
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{ AtomicBool, Ordering as AtomicOrdering };

use anyhow;
use log;

use crate::peripheral::PeripheralModel;
use crate::sim;
use crate::sim::{ Config, Halt, OutputConsumer, RunBound, SchedulingError, Time };
use crate::stimulus::{ Repeats, UserEvent, UserEventGenerator };

/// a one-shot callback scheduled with `Scheduler::schedule_event`
/// 
/// receives the event time and the installed model, if any
pub type Callback = Box<
    dyn FnOnce(Time, Option<&mut (dyn PeripheralModel + 'static)>) -> anyhow::Result<()>
>;

enum Action {
    /// model wake carrying its arming token
    Model(u64),
    /// firing of the stimulus event at `index`; `repeats` are the firings
    /// left after this one
    Stimulus { index: usize, repeats: Repeats },
    Callback(Callback),
}

struct ScheduledEvent {
    time: Time,
    seq: u64,
    action: Action,
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    // times are always finite, so total_cmp agrees with numeric order
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.total_cmp(&other.time)
            .then(self.seq.cmp(&other.seq))
    }
}

/// pause and stop requests for a scheduler
/// 
/// cloneable so that a consumer or another thread can request a pause or
/// stop; requests are observed between iterations only
#[derive(Clone, Debug, Default)]
pub struct ControlHandle {
    paused: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
}

impl ControlHandle {

    pub fn pause(&self) {
        self.paused.store(true, AtomicOrdering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, AtomicOrdering::SeqCst);
    }

    pub fn request_stop(&self) {
        self.stop_requested.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(AtomicOrdering::SeqCst)
    }

    /// consume a pending stop request
    pub fn take_stop_request(&self) -> bool {
        self.stop_requested.swap(false, AtomicOrdering::SeqCst)
    }

    fn reset(&self) {
        self.paused.store(false, AtomicOrdering::SeqCst);
        self.stop_requested.store(false, AtomicOrdering::SeqCst);
    }
}

/// discrete-event scheduler
/// 
/// events are ordered by time and then by scheduling order. all events at
/// the minimal pending time execute within one iteration, including those
/// scheduled at that same time while the iteration runs; the consumer is
/// then invoked once with the model's outputs.
/// 
/// the installed model never schedules itself: the scheduler arms a single
/// model wake at a time from the values returned by `initialize`, `update`
/// and `wake`. a superseded wake stays in the queue and is discarded
/// when popped.
#[derive(Default)]
pub struct Scheduler {
    config: Config,
    current_time: Time,
    pending: BinaryHeap<Reverse<ScheduledEvent>>,
    next_seq: u64,
    model: Option<Box<dyn PeripheralModel>>,
    model_wake: Option<(Time, u64)>,
    next_token: u64,
    stimulus: UserEventGenerator,
    consumer: Option<Box<dyn OutputConsumer>>,
    control: ControlHandle,
    running: bool,
    initialized: bool,
    steps: u64,
    rearmed_in_place: bool,
}

impl Scheduler {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with(config: Config) -> Self {
        Self { config, ..Self::default() }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// install a peripheral model, replacing the current one
    /// 
    /// the model takes effect at the next `init_simulation`
    pub fn set_model(&mut self, model: Box<dyn PeripheralModel>) -> &mut Self {
        log::debug!("installed model `{}`", model.name());
        self.model = Some(model);
        self.model_wake = None;
        self.initialized = false;
        self
    }

    pub fn model(&self) -> Option<&dyn PeripheralModel> {
        self.model.as_deref()
    }

    pub fn model_mut(&mut self) -> Option<&mut (dyn PeripheralModel + 'static)> {
        self.model.as_deref_mut()
    }

    /// install the output consumer invoked once per iteration
    pub fn set_consumer(&mut self, consumer: impl OutputConsumer + 'static) -> &mut Self {
        self.consumer = Some(Box::new(consumer));
        self
    }

    pub fn take_consumer(&mut self) -> Option<Box<dyn OutputConsumer>> {
        self.consumer.take()
    }

    /// replace the stimulus generator
    pub fn set_stimulus(&mut self, stimulus: UserEventGenerator) -> &mut Self {
        self.stimulus = stimulus;
        self
    }

    pub fn stimulus(&self) -> &UserEventGenerator {
        &self.stimulus
    }

    /// register a user event, returning its index in the generator
    /// 
    /// if the simulation is already initialized, the event's first firing
    /// is scheduled immediately
    pub fn add_user_event(&mut self, event: UserEvent) -> Result<usize, sim::Error> {
        let now = self.current_time;
        let (start, repeats) = (event.start_time, event.repeats());
        if self.initialized && start < now {
            let err = SchedulingError::InPast { requested: start, now };
            return Err(sim::Error::Scheduling(err, now));
        }
        let index = self.stimulus.add(event)
            .map_err(|err| sim::Error::Scheduling(err, now))?;
        if self.initialized {
            self.push(start, Action::Stimulus { index, repeats })
                .map_err(|err| sim::Error::Scheduling(err, now))?;
        }
        Ok(index)
    }

    /// a handle for pausing or stopping the run from elsewhere
    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    pub fn current_time(&self) -> Time {
        self.current_time
    }

    pub fn is_simulation_running(&self) -> bool {
        self.running
    }

    pub fn is_simulation_paused(&self) -> bool {
        self.control.is_paused()
    }

    /// number of iterations executed since `init_simulation`
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// number of queued events, including superseded model wakes
    pub fn pending_events(&self) -> usize {
        self.pending.len()
    }

    /// time of the earliest queued event
    pub fn next_event_time(&self) -> Option<Time> {
        self.pending.peek().map(|Reverse(event)| event.time)
    }

    /// schedule a one-shot callback at an absolute time
    /// 
    /// times earlier than the current time are rejected
    pub fn schedule_event<F>(&mut self, time: Time, callback: F) -> Result<(), sim::Error>
    where
        F: FnOnce(Time, Option<&mut (dyn PeripheralModel + 'static)>) -> anyhow::Result<()> + 'static,
    {
        self.push(time, Action::Callback(Box::new(callback)))
            .map_err(|err| sim::Error::Scheduling(err, self.current_time))
    }

    fn push(&mut self, time: Time, action: Action) -> Result<(), SchedulingError> {
        if !time.is_finite() {
            return Err(SchedulingError::NonFinite(time));
        }
        if time < self.current_time {
            return Err(SchedulingError::InPast { requested: time, now: self.current_time });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Reverse(ScheduledEvent { time, seq, action }));
        Ok(())
    }

    /// arm a new model wake, superseding any pending one
    fn arm_model(&mut self, time: Time) -> Result<(), sim::Error> {
        let token = self.next_token;
        self.next_token += 1;
        self.push(time, Action::Model(token))
            .map_err(|err| sim::Error::Scheduling(err, self.current_time))?;
        self.model_wake = Some((time, token));
        log::trace!("model wake armed at {time} (token {token})");
        Ok(())
    }

    /// ask the model to re-evaluate after an external mutation
    fn rearm_model(&mut self, now: Time) -> Result<(), sim::Error> {
        let wake = match self.model.as_mut() {
            Some(model) => model.wake(now),
            None => None,
        };
        if let Some(time) = wake {
            if self.model_wake.map_or(true, |(pending, _)| time < pending) {
                self.arm_model(time)?;
            }
        }
        Ok(())
    }

    /// reset time to zero, clear all pending events, initialize the model
    /// and schedule the first firing of every user event
    pub fn init_simulation(&mut self) -> Result<(), sim::Error> {
        self.current_time = 0.0;
        self.pending.clear();
        self.model_wake = None;
        self.steps = 0;
        self.running = false;
        self.control.reset();

        let first_wake = match self.model.as_mut() {
            Some(model) => model.initialize(self.current_time)
                .map_err(|err| sim::Error::Peripheral(err, 0.0))?,
            None => None,
        };
        if let Some(time) = first_wake {
            self.arm_model(time)?;
        }

        let firings: Vec<(Time, Action)> = self.stimulus.events().iter()
            .enumerate()
            .map(|(index, event)| {
                (event.start_time, Action::Stimulus { index, repeats: event.repeats() })
            })
            .collect();
        for (time, action) in firings {
            self.push(time, action)
                .map_err(|err| sim::Error::Scheduling(err, 0.0))?;
        }

        self.initialized = true;
        log::info!(
            "simulation initialized: model `{}`, {} user event(s)",
            self.model.as_ref().map_or("<none>", |model| model.name()),
            self.stimulus.len(),
        );
        Ok(())
    }

    /// run iterations until the bound is reached, the event set is
    /// exhausted, or a pause or stop is requested
    /// 
    /// initializes the simulation first if needed. an error raised by an
    /// event aborts the run and is returned.
    pub fn start_simulation(&mut self, bound: RunBound) -> Result<Halt, sim::Error> {
        if !self.initialized {
            self.init_simulation()?;
        }
        self.running = true;

        let mut executed = 0u64;
        let halt = loop {
            if self.control.take_stop_request() {
                self.stop_simulation();
                break Halt::Stopped;
            }
            if self.control.is_paused() {
                break Halt::Paused;
            }
            let limit = match bound {
                RunBound::Steps(steps) => Some(steps),
                RunBound::Unbounded => self.config.step_limit,
                RunBound::Until(_) => None,
            };
            if limit.map_or(false, |limit| executed >= limit) {
                break Halt::StepLimit;
            }
            let Some(next) = self.next_event_time() else {
                break Halt::Exhausted;
            };
            if let RunBound::Until(ceiling) = bound {
                if next > ceiling {
                    break Halt::TimeLimit;
                }
            }

            match self.step() {
                Ok(true) => executed += 1,
                Ok(false) => (),
                Err(err) => {
                    self.running = false;
                    return Err(err);
                }
            }
        };

        if halt != Halt::Paused {
            self.running = false;
        }
        log::debug!("simulation halted at {}: {:?} after {} iteration(s)", self.current_time, halt, executed);
        Ok(halt)
    }

    /// execute every event at the earliest pending time
    /// 
    /// returns false if only superseded model wakes were popped, in which
    /// case nothing is reported. a repeating event or model wake that keeps
    /// landing on the current time fails with `SchedulingError::Stalled`.
    fn step(&mut self) -> Result<bool, sim::Error> {
        let Some(Reverse(first)) = self.pending.pop() else {
            return Ok(false);
        };
        let now = first.time;
        self.current_time = now;
        self.rearmed_in_place = false;

        let mut live = false;
        let mut next = Some(first);
        while let Some(event) = next.take() {
            live |= self.execute(now, event.action)?;
            if self.next_event_time() == Some(now) {
                next = self.pending.pop().map(|Reverse(event)| event);
            }
        }

        if live {
            self.steps += 1;
            let outputs = self.model.as_ref()
                .map(|model| model.outputs())
                .unwrap_or_default();
            log::trace!("step {} @ {}: {:?}", self.steps, now, outputs);
            if let Some(consumer) = self.consumer.as_mut() {
                consumer.consume(now, &outputs)?;
            }
        }
        Ok(live)
    }

    fn execute(&mut self, now: Time, action: Action) -> Result<bool, sim::Error> {
        match action {
            Action::Model(token) => {
                if self.model_wake.map(|(_, armed)| armed) != Some(token) {
                    log::trace!("discarding superseded model wake (token {token}) @ {now}");
                    return Ok(false);
                }
                self.model_wake = None;
                let Some(model) = self.model.as_mut() else {
                    return Ok(false);
                };
                let next = model.update(now)
                    .map_err(|err| sim::Error::Peripheral(err, now))?;
                if let Some(time) = next.filter(|_| self.running) {
                    // one same-time update per iteration, then the model must move on
                    if time <= now {
                        if self.rearmed_in_place {
                            Self::advances(time, now)?;
                        }
                        self.rearmed_in_place = true;
                    }
                    self.arm_model(time)?;
                }
            },
            Action::Stimulus { index, repeats } => {
                let Some(event) = self.stimulus.get(index).cloned() else {
                    return Ok(false);
                };
                let model = self.model.as_mut()
                    .ok_or(sim::Error::Scheduling(SchedulingError::NoModel, now))?;
                if !event.target.is_empty() && event.target != model.name() {
                    let err = SchedulingError::TargetMismatch {
                        target: event.target.clone(),
                        installed: model.name().to_string(),
                    };
                    return Err(sim::Error::Scheduling(err, now));
                }
                model.apply_user_event(&event)
                    .map_err(|err| sim::Error::Peripheral(err, now))?;
                log::debug!(
                    "user event {index} @ {now}: {:?} {:#010x}",
                    event.kind, event.register_address,
                );
                if let Some(repeats) = repeats.next() {
                    let next = now + event.period;
                    Self::advances(next, now)?;
                    self.push(next, Action::Stimulus { index, repeats })
                        .map_err(|err| sim::Error::Scheduling(err, now))?;
                }
                self.rearm_model(now)?;
            },
            Action::Callback(callback) => {
                callback(now, self.model.as_deref_mut())
                    .map_err(|err| sim::Error::Callback(err, now))?;
                self.rearm_model(now)?;
            },
        }
        Ok(true)
    }

    // a re-queue at the current time would never let the iteration end
    fn advances(next: Time, now: Time) -> Result<(), sim::Error> {
        if next <= now {
            return Err(sim::Error::Scheduling(SchedulingError::Stalled { next, now }, now));
        }
        Ok(())
    }

    pub fn pause_simulation(&self) {
        self.control.pause();
    }

    pub fn resume_simulation(&self) {
        self.control.resume();
    }

    /// stop the run, discard every pending event and reset time to zero
    /// 
    /// calling this on a stopped scheduler has no further effect
    pub fn stop_simulation(&mut self) {
        if self.running || !self.pending.is_empty() {
            log::info!("simulation stopped at {}", self.current_time);
        }
        self.running = false;
        self.initialized = false;
        self.pending.clear();
        self.model_wake = None;
        self.current_time = 0.0;
        self.control.reset();
    }

    /// stop the run and detach the installed model
    pub fn clean_simulation(&mut self) -> Option<Box<dyn PeripheralModel>> {
        self.stop_simulation();
        let model = self.model.take();
        if let Some(model) = model.as_ref() {
            log::info!("detached model `{}`", model.name());
        }
        model
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::peripheral::generic::CounterModel;

    #[test]
    fn test_event_ordering() {
        let mut scheduler = Scheduler::new();
        scheduler.init_simulation().expect("failed to initialize");
        let order = Rc::new(RefCell::new(Vec::new()));

        for (time, tag) in [(2.0, "b"), (1.0, "a"), (2.0, "c"), (3.0, "d")] {
            let order = order.clone();
            scheduler.schedule_event(time, move |now, _| {
                order.borrow_mut().push((now, tag));
                Ok(())
            }).expect("failed to schedule event");
        }
        assert_eq!(scheduler.next_event_time(), Some(1.0));

        let halt = scheduler.start_simulation(RunBound::Unbounded)
            .expect("simulation failed");
        assert_eq!(halt, Halt::Exhausted);
        assert_eq!(*order.borrow(), vec![(1.0, "a"), (2.0, "b"), (2.0, "c"), (3.0, "d")]);
    }

    #[test]
    fn test_superseded_wake_discarded() {
        env_logger::try_init().ok();
        let mut scheduler = Scheduler::new();
        scheduler.set_model(Box::new(CounterModel::new_with(100, 0, 1.0, 1)
            .expect("failed to create counter")));
        scheduler.init_simulation().expect("failed to initialize");

        // the pending wake at 1.0 is superseded by one at 0.5
        scheduler.arm_model(0.5).expect("failed to arm wake");
        assert_eq!(scheduler.pending_events(), 2);

        let halt = scheduler.start_simulation(RunBound::Until(1.2))
            .expect("simulation failed");
        assert_eq!(halt, Halt::TimeLimit);
        // only the wake at 0.5 incremented the counter
        assert_eq!(scheduler.steps(), 1);
        assert_eq!(scheduler.current_time(), 1.0);
        assert_eq!(scheduler.next_event_time(), Some(1.5));
        assert_eq!(scheduler.model().map(|model| model.outputs()[0].value.as_int()), Some(1));
    }

    #[test]
    fn test_schedule_rejects_invalid_times() {
        let mut scheduler = Scheduler::new();
        scheduler.init_simulation().expect("failed to initialize");
        let err = scheduler.schedule_event(f64::NAN, |_, _| Ok(()))
            .expect_err("non-finite time accepted");
        assert!(matches!(err.as_scheduling(), Some(SchedulingError::NonFinite(_))));

        scheduler.schedule_event(2.0, |_, _| Ok(())).expect("failed to schedule event");
        scheduler.start_simulation(RunBound::Steps(1)).expect("simulation failed");
        assert_eq!(scheduler.current_time(), 2.0);

        let err = scheduler.schedule_event(1.0, |_, _| Ok(()))
            .expect_err("past time accepted");
        assert_eq!(
            err.as_scheduling(),
            Some(&SchedulingError::InPast { requested: 1.0, now: 2.0 }),
        );
    }
}
