use std::cell::RefCell;
use std::rc::Rc;

use anyhow::anyhow;

use periph_sim::arch::cortex_m::systick::{ SysTickTimerModel, CSR };
use periph_sim::peripheral;
use periph_sim::peripheral::PeripheralModel;
use periph_sim::peripheral::generic::CounterModel;
use periph_sim::sim;
use periph_sim::sim::{ Config, Halt, Output, RunBound, Scheduler, SchedulingError, Time, Value };

/// a model that asks to be updated again at the same time once
#[derive(Clone, Default)]
struct Repeater {
    updates: u64,
}

impl PeripheralModel for Repeater {
    fn name(&self) -> &str {
        "repeater"
    }

    fn initialize(&mut self, now: Time) -> Result<Option<Time>, peripheral::Error> {
        self.updates = 0;
        Ok(Some(now + 1.0))
    }

    fn update(&mut self, now: Time) -> Result<Option<Time>, peripheral::Error> {
        self.updates += 1;
        Ok((self.updates % 2 == 1).then_some(now).or(Some(now + 1.0)))
    }

    fn output_names(&self) -> &'static [&'static str] {
        &["UPDATES"]
    }

    fn outputs(&self) -> Vec<Output> {
        vec![Output::new_with("UPDATES", Value::Int(self.updates))]
    }

    fn read_register(&self, address: u32) -> Result<u32, peripheral::Error> {
        Err(peripheral::RegisterAccessError::Unknown(address).into())
    }

    fn write_register(&mut self, address: u32, _value: u32) -> Result<(), peripheral::Error> {
        Err(peripheral::RegisterAccessError::Unknown(address).into())
    }
}

/// a model that keeps asking to be updated at the same time
#[derive(Clone, Default)]
struct Stuck;

impl PeripheralModel for Stuck {
    fn name(&self) -> &str {
        "stuck"
    }

    fn initialize(&mut self, _now: Time) -> Result<Option<Time>, peripheral::Error> {
        Ok(Some(1.0))
    }

    fn update(&mut self, now: Time) -> Result<Option<Time>, peripheral::Error> {
        Ok(Some(now))
    }

    fn output_names(&self) -> &'static [&'static str] {
        &[]
    }

    fn outputs(&self) -> Vec<Output> {
        Vec::new()
    }

    fn read_register(&self, address: u32) -> Result<u32, peripheral::Error> {
        Err(peripheral::RegisterAccessError::Unknown(address).into())
    }

    fn write_register(&mut self, address: u32, _value: u32) -> Result<(), peripheral::Error> {
        Err(peripheral::RegisterAccessError::Unknown(address).into())
    }
}

type Trace = Rc<RefCell<Vec<(Time, Vec<Output>)>>>;

fn traced(scheduler: &mut Scheduler) -> Trace {
    let trace: Trace = Rc::default();
    let sink = trace.clone();
    scheduler.set_consumer(move |time: Time, outputs: &[Output]| {
        sink.borrow_mut().push((time, outputs.to_vec()));
    });
    trace
}

fn counter_scheduler(config: Config) -> Scheduler {
    let mut scheduler = Scheduler::new_with(config);
    scheduler.set_model(Box::new(CounterModel::new_with(3, 2, 1.0, 1)
        .expect("failed to create counter")));
    scheduler
}

#[test]
fn test_simultaneous_events_share_iteration() {
    env_logger::try_init().ok();
    let mut scheduler = Scheduler::new();
    let trace = traced(&mut scheduler);
    scheduler.init_simulation().expect("failed to initialize");

    let fired = Rc::new(RefCell::new(Vec::new()));
    for (time, tag) in [(2.0, "first"), (3.0, "later"), (2.0, "second")] {
        let fired = fired.clone();
        scheduler.schedule_event(time, move |now, _| {
            fired.borrow_mut().push((now, tag));
            Ok(())
        }).expect("failed to schedule event");
    }

    let halt = scheduler.start_simulation(RunBound::Steps(1))
        .expect("simulation failed");
    assert_eq!(halt, Halt::StepLimit);
    assert_eq!(*fired.borrow(), vec![(2.0, "first"), (2.0, "second")]);
    assert_eq!(scheduler.current_time(), 2.0);
    assert_eq!(trace.borrow().len(), 1);
    assert_eq!(scheduler.next_event_time(), Some(3.0));
}

#[test]
fn test_same_time_wake_runs_in_iteration() {
    let mut scheduler = Scheduler::new();
    scheduler.set_model(Box::new(Repeater::default()));
    let trace = traced(&mut scheduler);
    scheduler.init_simulation().expect("failed to initialize");

    scheduler.start_simulation(RunBound::Steps(2)).expect("simulation failed");
    let trace = trace.borrow();
    assert_eq!(trace.len(), 2);
    assert_eq!(trace[0], (1.0, vec![Output::new_with("UPDATES", Value::Int(2))]));
    assert_eq!(trace[1], (2.0, vec![Output::new_with("UPDATES", Value::Int(4))]));
}

#[test]
fn test_time_is_non_decreasing() {
    let mut scheduler = counter_scheduler(Config { step_limit: Some(20), ..Config::default() });
    let trace = traced(&mut scheduler);
    scheduler.init_simulation().expect("failed to initialize");
    scheduler.schedule_event(4.0, |_, _| Ok(())).expect("failed to schedule event");
    scheduler.schedule_event(4.5, |_, _| Ok(())).expect("failed to schedule event");

    let halt = scheduler.start_simulation(RunBound::Unbounded)
        .expect("simulation failed");
    assert_eq!(halt, Halt::StepLimit);
    assert_eq!(scheduler.steps(), 20);

    let times: Vec<Time> = trace.borrow().iter().map(|(time, _)| *time).collect();
    assert_eq!(times.len(), 20);
    assert!(times.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(times.contains(&4.5));
}

#[test]
fn test_counter_overflow_pulse() {
    let mut scheduler = counter_scheduler(Config::default());
    let trace = traced(&mut scheduler);
    scheduler.init_simulation().expect("failed to initialize");
    scheduler.start_simulation(RunBound::Steps(3)).expect("simulation failed");

    let values: Vec<(u64, bool)> = trace.borrow().iter()
        .map(|(_, outputs)| (outputs[0].value.as_int(), outputs[1].value.as_bool()))
        .collect();
    assert_eq!(values, vec![(3, false), (0, true), (1, false)]);
}

#[test]
fn test_superseded_wake_is_discarded() {
    let mut scheduler = Scheduler::new();
    scheduler.set_model(Box::new(SysTickTimerModel::new_with(0x1, 10, 0, 0, 4.0, 1.0)
        .expect("failed to create systick")));
    let trace = traced(&mut scheduler);
    scheduler.init_simulation().expect("failed to initialize");

    // switch to the 4 Hz processor clock before the first 1 Hz tick
    scheduler.schedule_event(0.5, |_, model| {
        let model = model.ok_or_else(|| anyhow!("no model installed"))?;
        model.write_register(CSR, 0x5)?;
        Ok(())
    }).expect("failed to schedule event");

    let halt = scheduler.start_simulation(RunBound::Until(1.25))
        .expect("simulation failed");
    assert_eq!(halt, Halt::TimeLimit);

    let trace = trace.borrow();
    let times: Vec<Time> = trace.iter().map(|(time, _)| *time).collect();
    assert_eq!(times, vec![0.5, 0.75, 1.0, 1.25]);
    assert_eq!(trace[3].1[0].value, Value::Int(7));
}

#[test]
fn test_pause_and_resume() {
    let mut scheduler = counter_scheduler(Config::default());
    let control = scheduler.control();
    let trace: Trace = Rc::default();
    let sink = trace.clone();
    scheduler.set_consumer(move |time: Time, outputs: &[Output]| {
        if time == 3.0 {
            control.pause();
        }
        sink.borrow_mut().push((time, outputs.to_vec()));
    });
    scheduler.init_simulation().expect("failed to initialize");

    let halt = scheduler.start_simulation(RunBound::Until(10.0))
        .expect("simulation failed");
    assert_eq!(halt, Halt::Paused);
    assert_eq!(scheduler.current_time(), 3.0);
    assert!(scheduler.is_simulation_paused());
    assert!(scheduler.is_simulation_running());

    // still paused: returns without executing
    let halt = scheduler.start_simulation(RunBound::Until(10.0))
        .expect("simulation failed");
    assert_eq!(halt, Halt::Paused);
    assert_eq!(trace.borrow().len(), 3);

    scheduler.resume_simulation();
    let halt = scheduler.start_simulation(RunBound::Until(5.0))
        .expect("simulation failed");
    assert_eq!(halt, Halt::TimeLimit);
    assert!(!scheduler.is_simulation_running());
    let times: Vec<Time> = trace.borrow().iter().map(|(time, _)| *time).collect();
    assert_eq!(times, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
}

#[test]
fn test_stop_is_idempotent() {
    let mut scheduler = counter_scheduler(Config::default());
    scheduler.init_simulation().expect("failed to initialize");
    scheduler.start_simulation(RunBound::Steps(3)).expect("simulation failed");
    assert_eq!(scheduler.current_time(), 3.0);

    scheduler.stop_simulation();
    scheduler.stop_simulation();
    assert_eq!(scheduler.current_time(), 0.0);
    assert_eq!(scheduler.pending_events(), 0);
    assert!(!scheduler.is_simulation_running());

    // a stop requested through the handle takes effect between iterations
    scheduler.init_simulation().expect("failed to initialize");
    scheduler.control().request_stop();
    let halt = scheduler.start_simulation(RunBound::Unbounded)
        .expect("simulation failed");
    assert_eq!(halt, Halt::Stopped);
    assert_eq!(scheduler.pending_events(), 0);
    assert_eq!(scheduler.steps(), 0);
}

#[test]
fn test_clean_detaches_model() {
    let mut scheduler = counter_scheduler(Config::default());
    scheduler.init_simulation().expect("failed to initialize");
    scheduler.start_simulation(RunBound::Steps(2)).expect("simulation failed");

    let model = scheduler.clean_simulation().expect("no model detached");
    assert_eq!(model.name(), "counter");
    assert!(scheduler.model().is_none());
    assert!(scheduler.clean_simulation().is_none());

    let halt = scheduler.start_simulation(RunBound::Unbounded)
        .expect("simulation failed");
    assert_eq!(halt, Halt::Exhausted);

    // a detached model can be reinstalled and restarted
    scheduler.set_model(model);
    scheduler.init_simulation().expect("failed to initialize");
    scheduler.start_simulation(RunBound::Steps(1)).expect("simulation failed");
    assert_eq!(scheduler.model().map(|model| model.outputs()[0].value), Some(Value::Int(3)));
}

#[test]
fn test_callback_error_aborts_run() {
    let mut scheduler = counter_scheduler(Config::default());
    scheduler.init_simulation().expect("failed to initialize");
    scheduler.schedule_event(2.5, |_, _| Err(anyhow!("callback failed")))
        .expect("failed to schedule event");

    let err = scheduler.start_simulation(RunBound::Unbounded)
        .expect_err("callback error ignored");
    assert!(matches!(err, sim::Error::Callback(_, time) if time == 2.5));
    assert!(!scheduler.is_simulation_running());
}

#[test]
fn test_model_stuck_at_same_time_fails() {
    let mut scheduler = Scheduler::new();
    scheduler.set_model(Box::new(Stuck));
    scheduler.init_simulation().expect("failed to initialize");

    let err = scheduler.start_simulation(RunBound::Steps(1))
        .expect_err("same-time wake loop not detected");
    assert_eq!(err.as_scheduling(), Some(&SchedulingError::Stalled { next: 1.0, now: 1.0 }));
    assert!(!scheduler.is_simulation_running());
}
