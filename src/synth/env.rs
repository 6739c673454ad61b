//! Segment envelope generator.
//!
//! Levels run in Q8.24 so the per-sample slopes keep precision over
//! segments lasting seconds. A segment that overshoots its target
//! clamps exactly onto it and falls through to the next state within
//! the same sample, so zero-length segments collapse cleanly.

use crate::fixed::{clamp_i32, fx8, ix8};
use crate::program::EnvParams;
use crate::tables::RateTables;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    Off,
    Atk,
    Dcy,
    At2,
    Sus,
    Rel,
}

#[derive(Debug)]
pub struct Env {
    state: State,
    rel: bool,
    l: i32,
    l1: i32,
    l2: i32,
    l3: i32,
    r1: i32,
    r2: i32,
    r3: i32,
    r4: i32,
}

impl Env {
    pub fn new() -> Env {
        Env {
            state: State::Off,
            rel: false,
            l: 0,
            l1: 0,
            l2: 0,
            l3: 0,
            r1: 0,
            r2: 0,
            r3: 0,
            r4: 0,
        }
    }

    pub fn reset(&mut self) {
        self.state = State::Off;
        self.rel = false;
        self.l = 0;
    }

    /// Starts the attack. The level is not reset, so a retrigger ramps
    /// from wherever the envelope currently sits.
    pub fn trigger(&mut self, params: &EnvParams, tables: &RateTables, _vel: u8) {
        // TODO apply the LV/T1V/TK velocity and key scaling parameters
        let t1 = tables.env_times[params.t1 as usize].max(1) as i32;
        let t2 = tables.env_times[params.t2 as usize].max(1) as i32;
        let t3 = tables.env_times[params.t3 as usize].max(1) as i32;
        let t4 = tables.env_times[params.t4 as usize].max(1) as i32;

        let l1 = fx8(clamp_i32(params.l1 as i32, -63, 63));
        let l2 = fx8(clamp_i32(params.l2 as i32, -63, 63));
        let l3 = fx8(clamp_i32(params.l3 as i32, -63, 63));

        self.r1 = l1 / t1;
        self.r2 = (l2 - l1) / t2;
        self.r3 = (l3 - l2) / t3;
        self.r4 = -l3 / t4;

        self.l1 = l1;
        self.l2 = l2;
        self.l3 = l3;

        self.state = State::Atk;
        self.rel = false;
    }

    /// Flags the release; consumed at the start of the next generate.
    pub fn release(&mut self, _vel: u8) {
        self.rel = true;
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn running(&self) -> bool {
        self.state != State::Off
    }

    pub fn generate(&mut self, outp: &mut [i8]) {
        let mut state = self.state;
        let mut l = self.l;

        let (l1, l2, l3) = (self.l1, self.l2, self.l3);
        let (r1, r2, r3, r4) = (self.r1, self.r2, self.r3, self.r4);

        fn ramping(r: i32, l: i32, target: i32) -> bool {
            if r < 0 {
                l > target
            } else {
                l < target
            }
        }
        fn step(r: i32, l: i32, target: i32) -> i32 {
            let l = l + r;
            if r < 0 {
                l.max(target)
            } else {
                l.min(target)
            }
        }

        if self.rel {
            state = State::Rel;
        }

        for out in outp.iter_mut() {
            loop {
                match state {
                    State::Off => {
                        l = 0;
                        break;
                    }
                    State::Atk => {
                        if ramping(r1, l, l1) {
                            l = step(r1, l, l1);
                            break;
                        }
                        state = State::Dcy;
                    }
                    State::Dcy => {
                        if ramping(r2, l, l2) {
                            l = step(r2, l, l2);
                            break;
                        }
                        state = State::At2;
                    }
                    State::At2 => {
                        if ramping(r3, l, l3) {
                            l = step(r3, l, l3);
                            break;
                        }
                        state = State::Sus;
                    }
                    State::Sus => {
                        l = l3;
                        break;
                    }
                    State::Rel => {
                        l += r4;
                        l = if r4 < 0 { l.max(0) } else { l.min(0) };
                        if l == 0 {
                            state = State::Off;
                        }
                        break;
                    }
                }
            }
            *out = ix8(l) as i8;
        }

        self.l = l;
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::RateTables;

    fn tables() -> RateTables {
        RateTables::new(48000.0)
    }

    fn params(l1: i8, l2: i8, l3: i8, t: [u8; 4]) -> EnvParams {
        EnvParams {
            l1,
            l2,
            l3,
            t1: t[0],
            t2: t[1],
            t3: t[2],
            t4: t[3],
            ..Default::default()
        }
    }

    #[test]
    fn zero_times_reach_sustain_immediately() {
        let rt = tables();
        let mut env = Env::new();
        env.trigger(&params(63, 63, 40, [0, 0, 0, 0]), &rt, 100);
        let mut out = [0i8; 4];
        env.generate(&mut out);
        // one sample per collapsed segment, then sustain at L3
        assert_eq!(out[0], 63);
        assert_eq!(out[3], 40);
        assert_eq!(env.state(), State::Sus);
    }

    #[test]
    fn attack_ramps_monotonically() {
        let rt = tables();
        let mut env = Env::new();
        env.trigger(&params(63, 63, 63, [20, 0, 0, 0]), &rt, 100);
        let mut out = [0i8; 512];
        env.generate(&mut out);
        for w in out.windows(2) {
            assert!(w[1] >= w[0]);
        }
    }

    #[test]
    fn release_ramps_to_zero_and_stops() {
        let rt = tables();
        let mut env = Env::new();
        env.trigger(&params(63, 63, 63, [0, 0, 0, 0]), &rt, 100);
        let mut out = [0i8; 8];
        env.generate(&mut out);
        assert!(env.running());

        env.release(0);
        let mut out = [0i8; 512];
        // t4=0 collapses within one sample
        env.generate(&mut out);
        assert_eq!(env.state(), State::Off);
        assert_eq!(*out.last().unwrap(), 0);
        assert!(!env.running());
    }

    #[test]
    fn release_interrupts_attack() {
        let rt = tables();
        let mut env = Env::new();
        env.trigger(&params(63, 63, 63, [40, 40, 40, 0]), &rt, 100);
        let mut out = [0i8; 16];
        env.generate(&mut out);
        env.release(0);
        env.generate(&mut out);
        assert_eq!(env.state(), State::Off);
    }

    #[test]
    fn negative_levels_ramp_down() {
        let rt = tables();
        let mut env = Env::new();
        env.trigger(&params(-63, -63, -63, [0, 0, 0, 0]), &rt, 100);
        let mut out = [0i8; 4];
        env.generate(&mut out);
        assert_eq!(out[0], -63);
    }

    #[test]
    fn retrigger_ramps_from_current_level() {
        let rt = tables();
        let mut env = Env::new();
        env.trigger(&params(63, 63, 63, [0, 0, 0, 0]), &rt, 100);
        let mut out = [0i8; 4];
        env.generate(&mut out);
        env.trigger(&params(63, 63, 63, [30, 0, 0, 0]), &rt, 100);
        let mut out = [0i8; 2];
        env.generate(&mut out);
        // still at the target, not restarted from zero
        assert_eq!(out[0], 63);
    }
}
