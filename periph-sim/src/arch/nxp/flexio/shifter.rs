//! flexio shifter
//! 
//! decodes SHIFTCTL and SHIFTCFG and shifts one bit per qualifying edge
//! of the associated timer
use bitflags::bitflags;
use log;

use crate::peripheral;
use super::{ Edge, ShiftCfg, ShiftCtl };

/// shifter operating mode (SMOD)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShifterMode {
    Disabled,
    Receive,
    Transmit,
}

impl ShifterMode {
    pub fn decode(smod: u8) -> Result<Self, peripheral::Error> {
        match smod {
            0b000 => Ok(Self::Disabled),
            0b001 => Ok(Self::Receive),
            0b010 => Ok(Self::Transmit),
            encoding => Err(peripheral::Error::UnsupportedMode {
                unit: "shifter",
                encoding: encoding as u32,
            }),
        }
    }
}

/// receive data source (INSRC)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputSource {
    Pin,
    /// output of shifter n+1
    NextShifter,
}

/// position within the current word
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Data,
    Stop,
}

bitflags! {
    /// shifter error conditions, reported together in SHIFTERR
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Faults: u8 {
        /// transmit word ended without a refreshed buffer
        const UNDERRUN = 1 << 0;
        /// received word stored over an unconsumed one
        const OVERRUN = 1 << 1;
        /// stop bit level mismatch
        const FRAMING = 1 << 2;
    }
}

// SSTART/SSTOP: 0b10 frames with a 0 bit, 0b11 with a 1 bit
fn frame_bit(encoding: u8) -> Option<bool> {
    match encoding {
        0b10 => Some(false),
        0b11 => Some(true),
        _ => None,
    }
}

/// flexio shifter
/// 
/// data is shifted LSB first. the status flag means "buffer empty" for a
/// transmitter and "buffer full" for a receiver.
#[derive(Clone, Debug)]
pub struct FlexIOShifter {
    index: usize,
    ctl: ShiftCtl,
    cfg: ShiftCfg,
    mode: ShifterMode,
    decode_error: Option<peripheral::Error>,
    start: Option<bool>,
    stop: Option<bool>,
    input: InputSource,
    word_bits: u32,
    phase: Phase,
    shift_reg: u32,
    bits: u32,
    buffer: u32,
    buffer_valid: bool,
    output: bool,
    status: bool,
    faults: Faults,
}

impl FlexIOShifter {

    pub fn new_with(index: usize, ctl: ShiftCtl, cfg: ShiftCfg) -> Self {
        let mut shifter = Self {
            index,
            ctl,
            cfg,
            mode: ShifterMode::Disabled,
            decode_error: None,
            start: None,
            stop: None,
            input: InputSource::Pin,
            word_bits: 8,
            phase: Phase::Idle,
            shift_reg: 0,
            bits: 0,
            buffer: 0,
            buffer_valid: false,
            output: true,
            status: false,
            faults: Faults::empty(),
        };
        shifter.configure(ctl, cfg);
        shifter
    }

    /// decode new register values and reset the shifter
    pub fn configure(&mut self, ctl: ShiftCtl, cfg: ShiftCfg) {
        self.ctl = ctl;
        self.cfg = cfg;
        self.decode_error = None;
        self.mode = match ShifterMode::decode(ctl.smod()) {
            Ok(mode) => mode,
            Err(err) => {
                log::warn!("flexio shifter {}: {}, shifter is inert", self.index, err);
                self.decode_error = Some(err);
                ShifterMode::Disabled
            },
        };
        self.start = frame_bit(cfg.sstart());
        self.stop = frame_bit(cfg.sstop());
        self.input = if cfg.insrc() { InputSource::NextShifter } else { InputSource::Pin };
        self.reset();
    }

    /// discard any word in flight and all flags
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.shift_reg = 0;
        self.bits = 0;
        self.buffer = 0;
        self.buffer_valid = false;
        self.output = true;
        self.status = self.mode == ShifterMode::Transmit;
        self.faults = Faults::empty();
    }

    /// set the word length from the associated timer's bit count
    pub fn set_word_bits(&mut self, bits: u32) {
        self.word_bits = bits.clamp(1, 32);
    }

    pub fn word_bits(&self) -> u32 {
        self.word_bits
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn mode(&self) -> ShifterMode {
        self.mode
    }

    pub fn decode_error(&self) -> Option<&peripheral::Error> {
        self.decode_error.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn input_source(&self) -> InputSource {
        self.input
    }

    pub fn timer_index(&self) -> usize {
        self.ctl.timsel() as usize
    }

    pub fn pin(&self) -> usize {
        self.ctl.pinsel() as usize
    }

    pub fn drives_pin(&self) -> bool {
        self.mode == ShifterMode::Transmit && self.ctl.pincfg() == 3
    }

    /// raw shifter output, as seen by a chained receiver
    pub fn output_level(&self) -> bool {
        self.output
    }

    pub fn pin_output(&self) -> bool {
        self.output ^ self.ctl.pinpol()
    }

    pub fn status(&self) -> bool {
        self.status
    }

    pub fn clear_status(&mut self) {
        self.status = false;
    }

    pub fn faults(&self) -> Faults {
        self.faults
    }

    pub fn has_error(&self) -> bool {
        !self.faults.is_empty()
    }

    pub fn clear_faults(&mut self) {
        self.faults = Faults::empty();
    }

    pub fn buffer(&self) -> u32 {
        self.buffer
    }

    /// fill the transmit buffer
    pub fn write_buffer(&mut self, value: u32) {
        self.buffer = value;
        if self.mode == ShifterMode::Transmit {
            self.buffer_valid = true;
            self.status = false;
        }
    }

    /// consume a received word
    pub fn take_buffer(&mut self) -> Option<u32> {
        if self.mode == ShifterMode::Receive && self.status {
            self.status = false;
            Some(self.buffer)
        } else {
            None
        }
    }

    /// whether the shifter acts on this timer edge
    pub fn qualifies(&self, edge: Edge) -> bool {
        match edge {
            Edge::None => false,
            Edge::Posedge => !self.ctl.timpol(),
            Edge::Negedge => self.ctl.timpol(),
        }
    }

    /// clock the shifter with a timer edge
    /// 
    /// `input` is the level of the selected pin, or of shifter n+1's
    /// output for a receiver chained with INSRC. returns false if the edge
    /// did not qualify.
    pub fn shift(&mut self, edge: Edge, input: bool) -> bool {
        if !self.qualifies(edge) {
            return false;
        }
        match self.mode {
            ShifterMode::Disabled => return false,
            ShifterMode::Transmit => self.shift_out(),
            ShifterMode::Receive => {
                let sample = match self.input {
                    InputSource::Pin => input ^ self.ctl.pinpol(),
                    InputSource::NextShifter => input,
                };
                self.shift_in(sample);
            },
        }
        true
    }

    fn shift_out(&mut self) {
        match self.phase {
            Phase::Idle => {
                if !self.buffer_valid {
                    // back to the idle level once the last bit has had its bit time
                    self.output = true;
                    return;
                }
                self.shift_reg = self.buffer;
                self.buffer_valid = false;
                self.status = true;
                self.bits = 0;
                self.phase = Phase::Data;
                match self.start {
                    Some(level) => self.output = level,
                    None => self.next_data_bit(),
                }
            },
            Phase::Data => self.next_data_bit(),
            Phase::Stop => {
                self.output = self.stop.unwrap_or(true);
                self.end_transmit();
            },
        }
    }

    fn next_data_bit(&mut self) {
        self.output = self.shift_reg & 1 != 0;
        self.shift_reg >>= 1;
        self.bits += 1;
        if self.bits == self.word_bits {
            if self.stop.is_some() {
                self.phase = Phase::Stop;
            } else {
                self.end_transmit();
            }
        }
    }

    fn end_transmit(&mut self) {
        self.phase = Phase::Idle;
        self.bits = 0;
        if !self.buffer_valid {
            log::trace!("flexio shifter {} underrun", self.index);
            self.faults |= Faults::UNDERRUN;
        }
    }

    fn shift_in(&mut self, sample: bool) {
        match self.phase {
            Phase::Idle => match self.start {
                Some(level) if sample == level => {
                    self.shift_reg = 0;
                    self.bits = 0;
                    self.phase = Phase::Data;
                },
                Some(_) => (),
                None => {
                    self.shift_reg = 0;
                    self.bits = 0;
                    self.phase = Phase::Data;
                    self.next_sample(sample);
                },
            },
            Phase::Data => self.next_sample(sample),
            Phase::Stop => {
                if self.stop.map_or(false, |level| level != sample) {
                    log::trace!("flexio shifter {} framing error", self.index);
                    self.faults |= Faults::FRAMING;
                }
                self.store();
            },
        }
    }

    fn next_sample(&mut self, sample: bool) {
        self.shift_reg = (self.shift_reg >> 1) | ((sample as u32) << (self.word_bits - 1));
        self.bits += 1;
        if self.bits == self.word_bits {
            if self.stop.is_some() {
                self.phase = Phase::Stop;
            } else {
                self.store();
            }
        }
    }

    fn store(&mut self) {
        if self.status {
            log::trace!("flexio shifter {} overrun", self.index);
            self.faults |= Faults::OVERRUN;
        }
        self.buffer = self.shift_reg;
        self.status = true;
        self.phase = Phase::Idle;
        self.bits = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transmitter(sstart: u8, sstop: u8) -> FlexIOShifter {
        FlexIOShifter::new_with(
            0,
            ShiftCtl::new().with_smod(0b010).with_pincfg(3),
            ShiftCfg::new().with_sstart(sstart).with_sstop(sstop),
        )
    }

    fn receiver(sstart: u8, sstop: u8) -> FlexIOShifter {
        FlexIOShifter::new_with(
            1,
            ShiftCtl::new().with_smod(0b001).with_timpol(true),
            ShiftCfg::new().with_sstart(sstart).with_sstop(sstop),
        )
    }

    #[test]
    fn test_transmit_framing() {
        let mut tx = transmitter(2, 3);
        tx.set_word_bits(4);
        assert!(tx.status());
        assert!(tx.drives_pin());

        tx.write_buffer(0b0110);
        assert!(!tx.status());
        assert!(!tx.shift(Edge::Negedge, false));

        let mut line = Vec::new();
        for _ in 0..6 {
            assert!(tx.shift(Edge::Posedge, false));
            line.push(tx.pin_output());
        }
        // start, data LSB first, stop
        assert_eq!(line, vec![false, false, true, true, false, true]);
        assert!(tx.status());
        assert_eq!(tx.faults(), Faults::UNDERRUN);
        assert_eq!(tx.phase(), Phase::Idle);
    }

    #[test]
    fn test_transmit_double_buffered() {
        let mut tx = transmitter(0, 0);
        tx.set_word_bits(2);
        tx.write_buffer(0b01);
        tx.shift(Edge::Posedge, false);
        assert!(tx.output_level());
        // refill while the first word is shifting
        tx.write_buffer(0b10);
        tx.shift(Edge::Posedge, false);
        assert!(!tx.output_level());
        assert!(!tx.has_error());

        tx.shift(Edge::Posedge, false);
        assert!(!tx.output_level());
        tx.shift(Edge::Posedge, false);
        assert!(tx.output_level());
        assert_eq!(tx.faults(), Faults::UNDERRUN);
    }

    #[test]
    fn test_transmit_without_stop_returns_idle() {
        let mut tx = transmitter(0, 0);
        tx.set_word_bits(2);
        tx.write_buffer(0b01);

        let mut line = Vec::new();
        for _ in 0..3 {
            tx.shift(Edge::Posedge, false);
            line.push(tx.output_level());
        }
        // the last data bit holds for a full bit, then the line idles high
        assert_eq!(line, vec![true, false, true]);
        assert_eq!(tx.phase(), Phase::Idle);
        assert_eq!(tx.faults(), Faults::UNDERRUN);
    }

    #[test]
    fn test_receive_word() {
        let mut rx = receiver(2, 3);
        rx.set_word_bits(8);
        assert!(!rx.status());
        assert!(!rx.shift(Edge::Posedge, false));

        // idle line, then start bit
        rx.shift(Edge::Negedge, true);
        assert_eq!(rx.phase(), Phase::Idle);
        rx.shift(Edge::Negedge, false);
        assert_eq!(rx.phase(), Phase::Data);

        for bit in 0..8 {
            rx.shift(Edge::Negedge, (0x5Au32 >> bit) & 1 != 0);
        }
        assert_eq!(rx.phase(), Phase::Stop);
        rx.shift(Edge::Negedge, true);

        assert!(rx.status());
        assert!(!rx.has_error());
        assert_eq!(rx.take_buffer(), Some(0x5A));
        assert_eq!(rx.take_buffer(), None);
    }

    #[test]
    fn test_receive_errors() {
        let mut rx = receiver(0, 3);
        rx.set_word_bits(2);

        for sample in [true, false, false] {
            rx.shift(Edge::Negedge, sample);
        }
        assert_eq!(rx.faults(), Faults::FRAMING);
        assert_eq!(rx.buffer(), 0b01);

        for sample in [false, true, true] {
            rx.shift(Edge::Negedge, sample);
        }
        assert_eq!(rx.faults(), Faults::FRAMING | Faults::OVERRUN);
        assert_eq!(rx.take_buffer(), Some(0b10));

        rx.clear_faults();
        assert!(!rx.has_error());
    }

    #[test]
    fn test_reserved_mode_inert() {
        let mut shifter = FlexIOShifter::new_with(2, ShiftCtl::new().with_smod(0b100), ShiftCfg::new());
        assert_eq!(shifter.mode(), ShifterMode::Disabled);
        assert_eq!(
            shifter.decode_error(),
            Some(&peripheral::Error::UnsupportedMode { unit: "shifter", encoding: 4 }),
        );
        shifter.write_buffer(0xFF);
        assert!(!shifter.shift(Edge::Posedge, true));
        assert!(!shifter.status());
    }
}
