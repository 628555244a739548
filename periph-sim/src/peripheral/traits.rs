//! peripheral traits
//! 
//! defines the capability contract every peripheral model implements
use dyn_clone::{ DynClone, clone_trait_object };

use crate::peripheral;
use crate::sim::{ Output, Time };
use crate::stimulus::{ MutationKind, UserEvent };

/// peripheral model trait
/// 
/// a model owns its register file and derived timing state. it never
/// holds a reference to the scheduler: `initialize`, `update` and `wake`
/// return the next simulated time at which the model wants to be updated,
/// and the scheduler enqueues that wake itself.
/// 
/// register reads through `read_register` have no side effects (they
/// behave like a debug-port access); models expose typed accessors for
/// hardware read-to-clear semantics.
/// 
/// DynClone allows a scheduler's model to be snapshotted through the
/// trait object.
pub trait PeripheralModel: DynClone {

    /// short model name, matched against `UserEvent::target`
    fn name(&self) -> &str;

    /// reset derived simulation state and return the first wake time
    fn initialize(&mut self, now: Time) -> Result<Option<Time>, peripheral::Error>;

    /// advance the model for the wake scheduled at `now` and return the
    /// next wake time, if any
    fn update(&mut self, now: Time) -> Result<Option<Time>, peripheral::Error>;

    /// re-evaluate timing after registers were mutated from outside
    /// 
    /// returns the earliest time the model needs to be updated. the
    /// scheduler replaces its pending wake only if this one is earlier.
    fn wake(&mut self, _now: Time) -> Option<Time> {
        None
    }

    /// names of the outputs in the order `outputs` reports them
    fn output_names(&self) -> &'static [&'static str];

    /// current output values
    fn outputs(&self) -> Vec<Output>;

    /// index of the named output within `outputs`
    fn output_index(&self, name: &str) -> Option<usize> {
        self.output_names().iter().position(|output| *output == name)
    }

    /// read a register by absolute address
    fn read_register(&self, address: u32) -> Result<u32, peripheral::Error>;

    /// write a register by absolute address
    fn write_register(&mut self, address: u32, value: u32) -> Result<(), peripheral::Error>;

    /// apply a stimulus event to the model's registers
    /// 
    /// bit mutations are read-modify-write through `read_register` and
    /// `write_register`
    fn apply_user_event(&mut self, event: &UserEvent) -> Result<(), peripheral::Error> {
        let address = event.register_address;
        let value = match event.kind {
            MutationKind::WriteValue => event.value,
            kind => {
                if event.bit_position >= 32 {
                    return Err(peripheral::Error::configuration(format!(
                        "bit position {} is outside a 32-bit register",
                        event.bit_position,
                    )));
                }
                let mask = 1u32 << event.bit_position;
                kind.apply(self.read_register(address)?, mask, event.value)
            }
        };
        self.write_register(address, value)
    }
}

clone_trait_object!(PeripheralModel);
