//! Periodic transient scheduling.
//!
//! Time is injected through [`Clock`] so scheduling can be driven by the
//! render loop's sample count in production and by hand in tests.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::dsp::voice::TransientEvent;
use crate::recipe::TransientSpec;
use crate::resource::{ResourceGuard, ResourceKind, ResourceProbe};

/// A source of "now", in seconds.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Clock advanced by the number of samples rendered.
#[derive(Debug, Clone, Copy)]
pub struct SampleClock {
    elapsed: u64,
    sample_rate: f64,
}

impl SampleClock {
    pub fn new(sample_rate: f64) -> Self {
        SampleClock {
            elapsed: 0,
            sample_rate,
        }
    }

    pub fn advance(&mut self, samples: usize) {
        self.elapsed += samples as u64;
    }

    pub fn elapsed_samples(&self) -> u64 {
        self.elapsed
    }
}

impl Clock for SampleClock {
    fn now(&self) -> f64 {
        self.elapsed as f64 / self.sample_rate
    }
}

/// A cancellable recurring trigger.
///
/// Each gap is `interval ± jitter`. If the clock jumps past more than one
/// period, the missed firings collapse into one and the next is scheduled
/// from `now`.
#[derive(Debug)]
pub struct PeriodicTask {
    interval: f64,
    jitter: f64,
    next_due: f64,
    guard: Option<ResourceGuard>,
}

impl PeriodicTask {
    /// Schedule the first firing one interval after `start`.
    pub fn new(interval: f64, jitter: f64, start: f64, guard: ResourceGuard) -> Self {
        PeriodicTask {
            interval,
            jitter,
            next_due: start + interval,
            guard: Some(guard),
        }
    }

    /// Returns true if the task fired at `now`.
    pub fn poll<R: Rng>(&mut self, now: f64, rng: &mut R) -> bool {
        if self.guard.is_none() || now < self.next_due {
            return false;
        }
        let gap = if self.jitter > 0.0 {
            self.interval + rng.gen_range(-self.jitter..=self.jitter)
        } else {
            self.interval
        };
        let behind = now - self.next_due >= self.interval;
        self.next_due = if behind { now } else { self.next_due } + gap;
        true
    }

    /// Stop future firings. Idempotent.
    pub fn cancel(&mut self) {
        self.guard = None;
    }

    pub fn is_active(&self) -> bool {
        self.guard.is_some()
    }

    pub fn next_due(&self) -> Option<f64> {
        self.is_active().then_some(self.next_due)
    }
}

/// Spawns one [`TransientEvent`] per tick of its [`PeriodicTask`] and
/// renders the events still sounding.
#[derive(Debug)]
pub struct TransientScheduler {
    spec: TransientSpec,
    task: PeriodicTask,
    in_flight: Vec<TransientEvent>,
    rng: Pcg32,
    sample_rate: f64,
    probe: ResourceProbe,
    fired: u64,
    first_fire: Option<f64>,
    last_fire: Option<f64>,
}

impl TransientScheduler {
    pub fn start(
        spec: TransientSpec,
        sample_rate: f64,
        now: f64,
        seed: u64,
        probe: ResourceProbe,
    ) -> Self {
        let task = PeriodicTask::new(
            spec.interval,
            spec.jitter,
            now,
            probe.acquire(ResourceKind::Timer),
        );
        TransientScheduler {
            spec,
            task,
            in_flight: Vec::new(),
            rng: Pcg32::seed_from_u64(seed),
            sample_rate,
            probe,
            fired: 0,
            first_fire: None,
            last_fire: None,
        }
    }

    /// Fire an event if the task is due. Finished events are dropped here,
    /// so nothing outlives the tick after its envelope completes.
    pub fn tick(&mut self, clock: &dyn Clock) {
        self.in_flight.retain(|e| !e.is_finished());

        let now = clock.now();
        if self.task.poll(now, &mut self.rng) {
            let event = TransientEvent::new(
                &self.spec.voice,
                self.spec.envelope,
                self.sample_rate,
                &mut self.rng,
                self.probe.acquire(ResourceKind::Generator),
            );
            self.in_flight.push(event);
            self.fired += 1;
            self.first_fire.get_or_insert(now);
            self.last_fire = Some(now);
        }
    }

    /// Sum of all sounding events for the next sample.
    pub fn next_sample(&mut self) -> f64 {
        self.in_flight.iter_mut().map(|e| e.next_sample()).sum()
    }

    /// Cancel the recurring trigger. Events already fired keep decaying.
    pub fn cancel(&mut self) {
        if self.task.is_active() {
            log::debug!("transient scheduler cancelled after {} events", self.fired);
        }
        self.task.cancel();
    }

    pub fn is_active(&self) -> bool {
        self.task.is_active()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.iter().filter(|e| !e.is_finished()).count()
    }

    pub fn fired(&self) -> u64 {
        self.fired
    }

    /// Mean seconds between fired events, once at least two have fired.
    pub fn mean_interval(&self) -> Option<f64> {
        match (self.first_fire, self.last_fire) {
            (Some(first), Some(last)) if self.fired > 1 => {
                Some((last - first) / (self.fired - 1) as f64)
            }
            _ => None,
        }
    }

    pub fn spec(&self) -> &TransientSpec {
        &self.spec
    }
}
