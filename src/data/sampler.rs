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

use crate::core::random::Generator;
use rand::Rng;

/// Produces the visiting order of one epoch over `len` examples.
pub trait Sampler: Send {
    fn order(&mut self, len: usize) -> Box<dyn Iterator<Item = usize> + Send>;
}

pub struct SequentialSampler;

impl Sampler for SequentialSampler {
    fn order(&mut self, len: usize) -> Box<dyn Iterator<Item = usize> + Send> {
        Box::new(0..len)
    }
}

/// Shuffles through a bounded look-ahead window instead of permuting the whole epoch.
pub struct WindowedShuffleSampler {
    window: usize,
    generator: Generator,
}

impl WindowedShuffleSampler {
    pub fn new(window: usize, generator: Generator) -> Self {
        WindowedShuffleSampler {
            window: window.max(1),
            generator,
        }
    }
}

impl Sampler for WindowedShuffleSampler {
    fn order(&mut self, len: usize) -> Box<dyn Iterator<Item = usize> + Send> {
        Box::new(ShuffleBuffer::new(0..len, self.window, self.generator.fork()))
    }
}

/// Iterator adapter holding up to `capacity` pending items and emitting a uniformly
/// chosen one each step, refilling from the source as it drains.
pub struct ShuffleBuffer<I: Iterator> {
    source: I,
    buffer: Vec<I::Item>,
    capacity: usize,
    generator: Generator,
}

impl<I: Iterator> ShuffleBuffer<I> {
    pub fn new(source: I, capacity: usize, generator: Generator) -> Self {
        let capacity = capacity.max(1);
        ShuffleBuffer {
            source,
            buffer: Vec::with_capacity(capacity),
            capacity,
            generator,
        }
    }
}

impl<I: Iterator> Iterator for ShuffleBuffer<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        while self.buffer.len() < self.capacity {
            match self.source.next() {
                Some(item) => self.buffer.push(item),
                None => break,
            }
        }

        if self.buffer.is_empty() {
            return None;
        }

        let pick = self.generator.rng().gen_range(0..self.buffer.len());
        Some(self.buffer.swap_remove(pick))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (low, high) = self.source.size_hint();
        let pending = self.buffer.len();
        (low + pending, high.map(|h| h + pending))
    }
}
