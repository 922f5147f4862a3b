// Copyright 2025 Plexus (https://github.com/plexus-net)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! At-a-point-in-time graph contexts.

use serde::{Deserialize, Serialize};

/// A closed interval of Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlice {
    pub from: i64,
    pub to: i64,
}

impl TimeSlice {
    pub fn new(from: i64, to: i64) -> Self {
        if from <= to {
            Self { from, to }
        } else {
            Self { from: to, to: from }
        }
    }

    /// A zero-width slice at a single instant.
    pub fn at(instant: i64) -> Self {
        Self::new(instant, instant)
    }

    /// Whether the window `[start, end]` intersects this slice. An open
    /// end (`None`) means the entity is still live.
    pub fn intersects(&self, start: i64, end: Option<i64>) -> bool {
        start <= self.to && end.map_or(true, |e| e >= self.from)
    }
}

/// The temporal binding of a graph handle: either the live graph or a
/// read-only view over a historical interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphContext {
    pub time_slice: Option<TimeSlice>,
}

impl GraphContext {
    /// The live, mutable graph.
    pub fn live() -> Self {
        Self::default()
    }

    /// A read-only view bound to `slice`.
    pub fn sliced(slice: TimeSlice) -> Self {
        Self {
            time_slice: Some(slice),
        }
    }

    pub fn is_live(&self) -> bool {
        self.time_slice.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_normalizes_bounds() {
        assert_eq!(TimeSlice::new(10, 5), TimeSlice { from: 5, to: 10 });
    }

    #[test]
    fn test_intersection() {
        let slice = TimeSlice::new(100, 200);
        assert!(slice.intersects(50, None));
        assert!(slice.intersects(50, Some(150)));
        assert!(slice.intersects(150, Some(300)));
        assert!(slice.intersects(200, None));
        assert!(!slice.intersects(201, None));
        assert!(!slice.intersects(10, Some(99)));
    }
}
