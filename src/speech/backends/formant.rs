//! Built-in formant synthesizer
//!
//! A small cascade formant synthesizer in the Klatt tradition: an impulsive
//! glottal source and a noise source feed second-order resonators tuned to
//! per-phoneme formant targets. It won't win prizes for naturalness, but it
//! needs nothing installed and renders every symbol the built-in
//! reconstructions produce.

use crate::speech::{AudioBuffer, SynthBackend};
use crate::{PieError, Result};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

/// Bandwidths of F1..F3 in Hz
const FORMANT_BANDWIDTHS: [f64; 3] = [60.0, 90.0, 150.0];
/// Fraction of each F0 period the glottis is open
const OPEN_PHASE_RATIO: f64 = 0.7;
/// Klatt-style pitch flutter, 0..1
const FLUTTER_LEVEL: f64 = 0.25;
/// Pitch falls by this fraction over a segment
const DECLINATION: f64 = 0.15;
/// Attack/release ramp per phone
const RAMP_MS: f64 = 4.0;
/// Seed for the noise source so renders are repeatable
const NOISE_SEED: u64 = 0x5049_4554_5453;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Manner {
    Vowel,
    Approximant,
    Nasal,
    Fricative,
    Stop,
    /// h-like aspiration
    Breath,
    /// glottal stop
    Catch,
}

/// Articulation of one phoneme, after modifiers
#[derive(Debug, Clone, Copy, PartialEq)]
struct Phone {
    manner: Manner,
    formants: [f64; 3],
    voiced: bool,
    /// Centre of frication or burst noise
    noise_hz: f64,
    duration_ms: f64,
    /// Aspiration after release (ʰ)
    aspiration_ms: f64,
    /// Breathy voice (ʱ)
    breathy: bool,
    burst_gain: f64,
}

impl Phone {
    fn new(manner: Manner, formants: [f64; 3], voiced: bool, noise_hz: f64, duration_ms: f64) -> Self {
        Self {
            manner,
            formants,
            voiced,
            noise_hz,
            duration_ms,
            aspiration_ms: 0.0,
            breathy: false,
            burst_gain: 1.0,
        }
    }

    /// Parse a phoneme symbol: a base letter plus IPA modifiers
    fn parse(symbol: &str) -> Option<Phone> {
        let mut chars = symbol.chars();
        let mut phone = base_phone(chars.next()?)?;

        for modifier in chars {
            match modifier {
                'ː' => phone.duration_ms *= 1.8,
                'ʰ' => phone.aspiration_ms = 50.0,
                'ʱ' => {
                    phone.aspiration_ms = 40.0;
                    phone.breathy = true;
                }
                'ʷ' => {
                    phone.formants[1] *= 0.7;
                    phone.duration_ms += 15.0;
                }
                'ʲ' => {
                    phone.formants[1] = phone.formants[1].max(2200.0);
                    phone.noise_hz = phone.noise_hz.max(2800.0);
                }
                'ʼ' => {
                    phone.voiced = false;
                    phone.burst_gain = 1.6;
                    phone.aspiration_ms = 0.0;
                }
                '\u{329}' => {
                    phone.manner = Manner::Vowel;
                    phone.duration_ms *= 1.6;
                }
                _ => return None,
            }
        }
        Some(phone)
    }
}

/// Targets for a bare phoneme letter
fn base_phone(ch: char) -> Option<Phone> {
    use Manner::*;
    let phone = match ch {
        'a' => Phone::new(Vowel, [730.0, 1090.0, 2440.0], true, 0.0, 110.0),
        'e' => Phone::new(Vowel, [530.0, 1840.0, 2480.0], true, 0.0, 100.0),
        'i' => Phone::new(Vowel, [270.0, 2290.0, 3010.0], true, 0.0, 90.0),
        'o' => Phone::new(Vowel, [570.0, 840.0, 2410.0], true, 0.0, 105.0),
        'u' => Phone::new(Vowel, [300.0, 870.0, 2240.0], true, 0.0, 95.0),
        'ə' => Phone::new(Vowel, [500.0, 1500.0, 2500.0], true, 0.0, 60.0),
        'j' => Phone::new(Approximant, [270.0, 2200.0, 3000.0], true, 0.0, 60.0),
        'w' => Phone::new(Approximant, [300.0, 610.0, 2200.0], true, 0.0, 60.0),
        'r' => Phone::new(Approximant, [490.0, 1350.0, 1690.0], true, 0.0, 65.0),
        'l' => Phone::new(Approximant, [360.0, 1300.0, 2800.0], true, 0.0, 65.0),
        'm' => Phone::new(Nasal, [280.0, 900.0, 2200.0], true, 0.0, 75.0),
        'n' => Phone::new(Nasal, [280.0, 1700.0, 2600.0], true, 0.0, 70.0),
        's' => Phone::new(Fricative, [500.0, 1500.0, 2500.0], false, 5500.0, 110.0),
        'z' => Phone::new(Fricative, [500.0, 1500.0, 2500.0], true, 5000.0, 90.0),
        'χ' | 'x' => Phone::new(Fricative, [500.0, 1200.0, 2500.0], false, 1500.0, 100.0),
        'ɣ' => Phone::new(Fricative, [500.0, 1200.0, 2500.0], true, 1200.0, 90.0),
        'h' => Phone::new(Breath, [500.0, 1500.0, 2500.0], false, 0.0, 70.0),
        'ʔ' => Phone::new(Catch, [500.0, 1500.0, 2500.0], false, 0.0, 50.0),
        'p' => Phone::new(Stop, [400.0, 800.0, 2200.0], false, 800.0, 90.0),
        'b' => Phone::new(Stop, [400.0, 800.0, 2200.0], true, 800.0, 80.0),
        't' => Phone::new(Stop, [400.0, 1700.0, 2600.0], false, 4000.0, 90.0),
        'd' => Phone::new(Stop, [400.0, 1700.0, 2600.0], true, 4000.0, 80.0),
        'k' => Phone::new(Stop, [400.0, 1600.0, 2300.0], false, 1800.0, 95.0),
        'g' | 'ɡ' => Phone::new(Stop, [400.0, 1600.0, 2300.0], true, 1800.0, 85.0),
        'c' => Phone::new(Stop, [300.0, 2200.0, 2900.0], false, 3000.0, 95.0),
        'ɟ' => Phone::new(Stop, [300.0, 2200.0, 2900.0], true, 3000.0, 85.0),
        _ => return None,
    };
    Some(phone)
}

/// Second-order IIR resonator.
///
/// ```text
/// y[n] = a * x[n] + b * y[n-1] + c * y[n-2]
/// ```
/// Gain is normalized at the centre frequency.
struct Resonator {
    sample_rate: f64,
    a: f64,
    b: f64,
    c: f64,
    y1: f64,
    y2: f64,
}

impl Resonator {
    fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            a: 1.0,
            b: 0.0,
            c: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Retune without resetting filter state.
    ///
    /// Frequencies above what the sample rate can carry are clamped.
    fn set(&mut self, f: f64, bw: f64) {
        let f = f.clamp(0.0, self.sample_rate * 0.45);
        let r = (-PI * bw.max(1.0) / self.sample_rate).exp();
        let w = 2.0 * PI * f / self.sample_rate;
        self.c = -(r * r);
        self.b = 2.0 * r * w.cos();
        self.a = 1.0 - r;
    }

    fn step(&mut self, x: f64) -> f64 {
        let y = self.a * x + self.b * self.y1 + self.c * self.y2;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

/// Pulse train low-pass filtered once per period
struct Glottis {
    sample_rate: f64,
    filter: Resonator,
    position: usize,
    period: usize,
}

impl Glottis {
    fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            filter: Resonator::new(sample_rate),
            position: 0,
            period: 0,
        }
    }

    fn next(&mut self, f0: f64) -> f64 {
        if self.position >= self.period {
            self.period = (self.sample_rate / f0).round().max(2.0) as usize;
            let open_phase = (self.period as f64 * OPEN_PHASE_RATIO).max(1.0);
            self.filter.set(0.0, self.sample_rate / open_phase);
            self.position = 0;
        }
        let pulse = match self.position {
            1 => 1.0,
            2 => -1.0,
            _ => 0.0,
        };
        self.position += 1;
        self.filter.step(pulse)
    }
}

/// Klatt's F0 flutter: three slow sines so pitch never sounds mechanical
fn flutter(f0: f64, time: f64) -> f64 {
    let w = 2.0 * PI * time;
    let a = (12.7 * w).sin() + (7.1 * w).sin() + (4.7 * w).sin();
    f0 * (1.0 + a * FLUTTER_LEVEL / 50.0)
}

/// Synthesis state carried across the phones of one segment
struct Voice {
    sample_rate: f64,
    pitch_hz: f64,
    glottis: Glottis,
    formants: [Resonator; 3],
    noise_filter: Resonator,
    rng: StdRng,
    /// Samples emitted so far
    clock: usize,
    /// Estimated segment length, drives declination
    planned: usize,
}

impl Voice {
    fn new(sample_rate: u32, pitch_hz: f64, planned: usize) -> Self {
        let sr = sample_rate as f64;
        Self {
            sample_rate: sr,
            pitch_hz,
            glottis: Glottis::new(sr),
            formants: [Resonator::new(sr), Resonator::new(sr), Resonator::new(sr)],
            noise_filter: Resonator::new(sr),
            rng: StdRng::seed_from_u64(NOISE_SEED),
            clock: 0,
            planned: planned.max(1),
        }
    }

    fn samples_for(&self, ms: f64) -> usize {
        (ms * self.sample_rate / 1000.0).round() as usize
    }

    fn voicing(&mut self) -> f64 {
        let progress = (self.clock as f64 / self.planned as f64).min(1.0);
        let f0 = self.pitch_hz * (1.0 - DECLINATION * progress);
        let f0 = flutter(f0, self.clock as f64 / self.sample_rate);
        self.glottis.next(f0)
    }

    fn noise(&mut self) -> f64 {
        self.rng.random::<f64>() * 2.0 - 1.0
    }

    fn tune(&mut self, phone: &Phone) {
        for (res, (&f, &bw)) in self
            .formants
            .iter_mut()
            .zip(phone.formants.iter().zip(FORMANT_BANDWIDTHS.iter()))
        {
            res.set(f, bw);
        }
        if phone.noise_hz > 0.0 {
            self.noise_filter.set(phone.noise_hz, phone.noise_hz * 0.4);
        }
    }

    fn cascade(&mut self, x: f64) -> f64 {
        self.formants.iter_mut().fold(x, |acc, res| res.step(acc))
    }

    /// Emit `len` samples of `sample_fn`, with attack/release ramps
    fn emit_with<F>(&mut self, len: usize, out: &mut Vec<f32>, mut sample_fn: F)
    where
        F: FnMut(&mut Self) -> f64,
    {
        let ramp = self.samples_for(RAMP_MS).max(1).min(len / 2 + 1);
        for i in 0..len {
            let edge = i.min(len - 1 - i);
            let envelope = if edge < ramp { edge as f64 / ramp as f64 } else { 1.0 };
            let s = sample_fn(self) * envelope;
            out.push(s as f32);
            self.clock += 1;
        }
    }

    fn articulate(&mut self, phone: &Phone, out: &mut Vec<f32>) {
        self.tune(phone);
        let len = self.samples_for(phone.duration_ms);
        let breathy = phone.breathy;

        match phone.manner {
            Manner::Vowel | Manner::Approximant | Manner::Nasal => {
                let gain = match phone.manner {
                    Manner::Vowel => 1.0,
                    Manner::Approximant => 0.6,
                    _ => 0.4,
                };
                self.emit_with(len, out, |v| {
                    let mut src = v.voicing();
                    if breathy {
                        src += v.noise() * 0.05;
                    }
                    v.cascade(src) * gain
                });
            }
            Manner::Fricative => {
                let voiced = phone.voiced;
                self.emit_with(len, out, |v| {
                    let hiss = v.noise();
                    let mut s = v.noise_filter.step(hiss) * 0.5;
                    if voiced {
                        let src = v.voicing();
                        s += v.cascade(src) * 0.3;
                    }
                    s
                });
            }
            Manner::Stop => {
                let closure = self.samples_for(phone.duration_ms * 0.6);
                let voiced = phone.voiced;
                self.emit_with(closure, out, |v| {
                    let src = v.voicing();
                    if voiced {
                        v.cascade(src) * 0.1
                    } else {
                        0.0
                    }
                });
                let burst = self.samples_for(12.0);
                let gain = 0.6 * phone.burst_gain;
                self.emit_with(burst, out, |v| {
                    let hiss = v.noise();
                    v.noise_filter.step(hiss) * gain
                });
                if phone.aspiration_ms > 0.0 {
                    let aspiration = self.samples_for(phone.aspiration_ms);
                    self.emit_with(aspiration, out, |v| {
                        let mut src = v.noise() * 0.25;
                        if breathy {
                            src += v.voicing() * 0.6;
                        }
                        v.cascade(src)
                    });
                }
            }
            Manner::Breath => {
                self.emit_with(len, out, |v| {
                    let src = v.noise() * 0.3;
                    v.cascade(src)
                });
            }
            Manner::Catch => {
                self.emit_with(len, out, |_| 0.0);
            }
        }
    }
}

/// Built-in formant synthesizer backend
pub struct FormantSynth {
    sample_rate: u32,
    pitch_hz: f64,
}

impl FormantSynth {
    pub fn new(sample_rate: u32, pitch_hz: f64) -> Self {
        Self {
            sample_rate,
            pitch_hz,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Can this backend render the symbol?
    pub fn supports(symbol: &str) -> bool {
        Phone::parse(symbol).is_some()
    }
}

impl SynthBackend for FormantSynth {
    fn name(&self) -> &str {
        "formant"
    }

    fn render(&self, phonemes: &[String]) -> Result<AudioBuffer> {
        let phones: Vec<Phone> = phonemes
            .iter()
            .filter_map(|symbol| {
                let phone = Phone::parse(symbol);
                if phone.is_none() {
                    warn!("Formant synthesizer can't render '{}', skipping", symbol);
                }
                phone
            })
            .collect();

        if phones.is_empty() {
            return Err(PieError::synthesis(format!(
                "No renderable phonemes in [{}]",
                phonemes.join(" ")
            )));
        }

        let planned_ms: f64 = phones.iter().map(|p| p.duration_ms + p.aspiration_ms).sum();
        let mut voice = Voice::new(self.sample_rate, self.pitch_hz, 0);
        voice.planned = voice.samples_for(planned_ms).max(1);

        let mut samples = Vec::with_capacity(voice.planned);
        for phone in &phones {
            voice.articulate(phone, &mut samples);
        }

        let mut audio = AudioBuffer::new(samples, self.sample_rate);
        audio.normalize(0.8);
        debug!(
            "Rendered {} phones into {:.3}s",
            phones.len(),
            audio.duration().as_secs_f64()
        );
        Ok(audio)
    }
}
