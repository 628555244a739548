//! loop a flexio uart transmitter back onto its own receiver and write
//! the resulting pin trace to stdout as csv
use std::io;

use periph_sim::arch::nxp::flexio::*;
use periph_sim::sim::{ Config, RunBound, Sample, Scheduler };
use periph_sim::sim::channel::Channel;
use periph_sim::stimulus::{ UserEvent, UserEventGenerator };

use csv;
use serde::Serialize;

// two bytes written to SHIFTBUF0, the first one consumed through SHIFTSTAT
static STIMULUS: &str = "\
start_time,period,repeat_count,target,kind,register_address,bit_position,value
0.5,0,0,flexio,WRITE_VALUE,1075495424,0,165
25.5,0,0,flexio,WRITE_VALUE,1075495424,0,60
30.5,0,0,flexio,WRITE_VALUE,1075494928,0,2
";

#[derive(Debug, Serialize)]
struct TraceRow {
    time: f64,
    tx_pin: u8,
    rx_ready: u8,
    rx_byte: u64,
}

impl From<&Sample> for TraceRow {
    fn from(sample: &Sample) -> Self {
        let level = |name| sample.get(name).map_or(0, |value| value.as_int());
        Self {
            time: sample.time,
            tx_pin: level("UART_TX_PIN") as u8,
            rx_ready: level("UART_RX_READY") as u8,
            rx_byte: level("UART_RX_BYTE"),
        }
    }
}

fn main() {
    env_logger::init();

    // timer 0: 1 tick per half bit, 8 bits per word
    // shifter 0 transmits on pin 0, shifter 1 samples pin 0 mid-bit
    let mut config = FlexIOConfig::new_with(FLEXIO1_BASE);
    config.set_ctrl(Ctrl::new().with_flexen(true))
        .and_then(|config| config.set_tim_ctl(0, TimCtl::new().with_timod(0b01)))
        .and_then(|config| config.set_tim_cmp(0, 0x0700))
        .and_then(|config| config.set_shift_ctl(0, ShiftCtl::new().with_smod(0b010).with_pincfg(3)))
        .and_then(|config| config.set_shift_cfg(0, ShiftCfg::new().with_sstart(2).with_sstop(3)))
        .and_then(|config| config.set_shift_ctl(1, ShiftCtl::new().with_smod(0b001).with_timpol(true)))
        .and_then(|config| config.set_shift_cfg(1, ShiftCfg::new().with_sstart(2).with_sstop(3)))
        .expect("failed to configure flexio");
    let flexio = FlexIOModel::new_with(config, 1.0)
        .expect("failed to create flexio model");

    let mut reader = csv::Reader::from_reader(STIMULUS.as_bytes());
    let events = reader.deserialize::<UserEvent>()
        .map(|result| result.expect("failed to parse user event"));
    let stimulus = UserEventGenerator::new_with(events)
        .expect("invalid user event");

    let sim_config = Config::default();
    let mut channel = Channel::new_with(sim_config.clone());
    let mut logger = channel.get_logger();

    let mut scheduler = Scheduler::new_with(sim_config);
    scheduler.set_model(Box::new(flexio))
        .set_stimulus(stimulus)
        .set_consumer(channel);
    scheduler.init_simulation()
        .expect("failed to initialize simulation");
    let halt = scheduler.start_simulation(RunBound::Until(50.0))
        .expect("simulation failed");
    log::info!("halted: {:?} at {}", halt, scheduler.current_time());

    log::debug!("samples:{}", logger.display_pending());
    let mut writer = csv::Writer::from_writer(io::stdout());
    for sample in logger.log() {
        writer.serialize(TraceRow::from(sample))
            .expect("failed to write trace row");
    }
    writer.flush().expect("failed to flush trace");
}
