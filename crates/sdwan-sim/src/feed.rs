//! Random-walk telemetry standing in for real link probes

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sdwan_path::{LinkSample, LinkUpdate, MetricsSource, Topology};

/// Ceiling the random walk keeps packet loss under (%)
pub const MAX_LOSS_PERCENT: f64 = 5.0;

/// Perturbs every link each sample: latency by ±10%, jitter by ±20%,
/// loss by ±0.1 points clamped to `0..=MAX_LOSS_PERCENT`
#[derive(Debug)]
pub struct RandomWalkFeed {
    rng: StdRng,
}

impl RandomWalkFeed {
    /// Deterministic feed
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Feed seeded from OS entropy
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl MetricsSource for RandomWalkFeed {
    fn sample(&mut self, topology: &Topology) -> Vec<LinkSample> {
        topology
            .links()
            .map(|(key, link)| {
                let (a, b) = key.endpoints();
                let update = LinkUpdate::new()
                    .latency(link.latency * self.rng.gen_range(0.9..1.1))
                    .jitter(link.jitter * self.rng.gen_range(0.8..1.2))
                    .packet_loss(
                        (link.packet_loss + self.rng.gen_range(-0.1..0.1))
                            .clamp(0.0, MAX_LOSS_PERCENT),
                    );
                LinkSample::new(a, b, update)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario;
    use sdwan_path::SdwanController;

    fn topology() -> Topology {
        let controller = SdwanController::new();
        scenario::build(&controller).unwrap();
        controller.topology().snapshot()
    }

    #[test]
    fn test_samples_every_link_within_bounds() {
        let topology = topology();
        let mut feed = RandomWalkFeed::seeded(7);
        let batch = feed.sample(&topology);

        assert_eq!(batch.len(), topology.link_count());
        for sample in &batch {
            let link = topology.link_between(&sample.a, &sample.b).unwrap();
            let latency = sample.update.latency.unwrap();
            let jitter = sample.update.jitter.unwrap();
            let loss = sample.update.packet_loss.unwrap();

            assert!(latency >= link.latency * 0.9 && latency <= link.latency * 1.1);
            assert!(jitter >= link.jitter * 0.8 && jitter <= link.jitter * 1.2);
            assert!((0.0..=MAX_LOSS_PERCENT).contains(&loss));
            assert!(sample.update.bandwidth.is_none());
        }
    }

    #[test]
    fn test_seeded_feed_is_reproducible() {
        let topology = topology();
        let a = RandomWalkFeed::seeded(42).sample(&topology);
        let b = RandomWalkFeed::seeded(42).sample(&topology);
        assert_eq!(a, b);
    }
}
