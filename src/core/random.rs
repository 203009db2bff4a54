// Copyright (C) 2024 Bellande Artificial Intelligence Computer Vision Research Innovation Center, Ronaldson Bellande

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use rand::prelude::*;
use rand_distr::Uniform;

/// Owned random source handed explicitly to every stochastic step.
///
/// Seeded generators replay the same draws; unseeded ones pull from OS entropy.
pub struct Generator {
    rng: StdRng,
}

impl Generator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Generator { rng }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(Some(seed))
    }

    /// Splits off an independent child generator. Children are drawn in call
    /// order, so a seeded parent yields the same children on every run.
    pub fn fork(&mut self) -> Generator {
        Generator {
            rng: StdRng::seed_from_u64(self.rng.next_u64()),
        }
    }

    pub fn uniform(&mut self, low: f32, high: f32) -> f32 {
        if low >= high {
            return low;
        }
        Uniform::new(low, high).sample(&mut self.rng)
    }

    pub fn bernoulli(&mut self, p: f32) -> bool {
        self.rng.gen::<f32>() < p
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_generators_replay() {
        let mut a = Generator::seeded(7);
        let mut b = Generator::seeded(7);
        for _ in 0..16 {
            assert_eq!(a.uniform(0.0, 1.0), b.uniform(0.0, 1.0));
        }
        assert_eq!(a.fork().rng().next_u64(), b.fork().rng().next_u64());
    }

    #[test]
    fn degenerate_range_returns_low() {
        let mut generator = Generator::seeded(1);
        assert_eq!(generator.uniform(0.5, 0.5), 0.5);
    }
}
