use std::{
    fmt::Display,
    ops::RangeInclusive,
};

use async_trait::async_trait;
use futures_util::lock::Mutex;

use crate::core::{
    hash::HashSet,
    types::{
        Integer,
        Value,
        WampDeserialize,
        WampDeserializeError,
        WampSerialize,
        WampSerializeError,
    },
};

/// An integer ID, used for identification of sessions, publications, subscriptions,
/// registrations, and requests.
///
/// The protocol only issues IDs in the range [`Id::MIN`] to [`Id::MAX`], but any integer is
/// accepted off the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Id(Integer);

impl Id {
    /// The minimum ID issued by the protocol.
    pub const MIN: Id = Id(1);

    /// The maximum ID issued by the protocol.
    pub const MAX: Id = Id(1 << 53);

    /// The underlying integer.
    pub fn value(&self) -> Integer {
        self.0
    }

    /// Checks if the ID falls within the range used by the protocol.
    pub fn in_protocol_range(&self) -> bool {
        self.0 >= Self::MIN.0 && self.0 <= Self::MAX.0
    }
}

impl Default for Id {
    fn default() -> Self {
        Id::MIN
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Integer> for Id {
    fn from(value: Integer) -> Self {
        Self(value)
    }
}

impl From<Id> for Integer {
    fn from(value: Id) -> Self {
        value.0
    }
}

impl From<Id> for Value {
    fn from(value: Id) -> Self {
        Value::Integer(value.0)
    }
}

impl WampSerialize for Id {
    fn wamp_serialize(self) -> Result<Value, WampSerializeError> {
        Ok(Value::Integer(self.0))
    }
}

impl WampDeserialize for Id {
    fn wamp_deserialize(value: Value) -> Result<Self, WampDeserializeError> {
        Integer::wamp_deserialize(value)
            .map(Id)
            .map_err(|err| err.annotate("invalid id".to_owned()))
    }
}

/// A generator of IDs.
///
/// All state is mutated under the generator's own lock, so a single generator may be shared by
/// concurrent requests.
#[async_trait]
pub trait IdGenerator: Send + Sync {
    /// Generates a new ID.
    ///
    /// Returns [`None`] when the generator is exhausted. No further requests may be issued with
    /// IDs from an exhausted generator.
    async fn next_id(&self) -> Option<Id>;

    /// Resets the generator to its initial state.
    async fn reset(&self);
}

/// What a [`SequentialIdGenerator`] does after passing its maximum.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SequentialOverflow {
    /// Stop generating IDs.
    Stop,
    /// Wrap around to the minimum.
    #[default]
    ResetToMin,
    /// Wrap around to zero.
    ResetToZero,
    /// Wrap around to the smallest representable integer.
    ResetToSmallestNegative,
}

#[derive(Debug)]
struct SequentialState {
    current: Integer,
    exhausted: bool,
}

/// An ID generator that generates IDs sequentially.
///
/// Used for session-scoped IDs.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    min: Integer,
    max: Integer,
    overflow: SequentialOverflow,
    state: Mutex<SequentialState>,
}

impl SequentialIdGenerator {
    /// Creates a new generator over `[min, max]`.
    ///
    /// The first generated ID is `min + 1`.
    pub fn new(min: Integer, max: Integer, overflow: SequentialOverflow) -> Self {
        Self {
            min,
            max,
            overflow,
            state: Mutex::new(SequentialState {
                current: min,
                exhausted: false,
            }),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new(Id::MIN.0, Id::MAX.0, SequentialOverflow::default())
    }
}

#[async_trait]
impl IdGenerator for SequentialIdGenerator {
    async fn next_id(&self) -> Option<Id> {
        let mut state = self.state.lock().await;
        if state.exhausted {
            return None;
        }
        let next = match state.current.checked_add(1).filter(|next| *next <= self.max) {
            Some(next) => next,
            None => match self.overflow {
                SequentialOverflow::Stop => {
                    state.exhausted = true;
                    return None;
                }
                SequentialOverflow::ResetToMin => self.min,
                SequentialOverflow::ResetToZero => 0,
                SequentialOverflow::ResetToSmallestNegative => Integer::MIN,
            },
        };
        state.current = next;
        Some(Id(next))
    }

    async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.current = self.min;
        state.exhausted = false;
    }
}

/// What a [`RandomIdGenerator`] does once every ID in its range has been issued.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RandomOverflow {
    /// Stop generating IDs.
    Stop,
    /// Forget all issued IDs and start a new epoch.
    #[default]
    ResetList,
}

/// An ID generator that draws IDs at random, never repeating an ID within an epoch.
///
/// Drawing retries until an unused value is found, so generation slows down as the epoch fills
/// up.
///
/// Used for request IDs.
#[derive(Debug)]
pub struct RandomIdGenerator {
    range: RangeInclusive<Integer>,
    overflow: RandomOverflow,
    issued: Mutex<HashSet<Integer>>,
}

impl RandomIdGenerator {
    /// Creates a new generator over the given range.
    pub fn new(range: RangeInclusive<Integer>, overflow: RandomOverflow) -> Self {
        Self {
            range,
            overflow,
            issued: Mutex::new(HashSet::default()),
        }
    }

    fn span(&self) -> u128 {
        if self.range.is_empty() {
            return 0;
        }
        (*self.range.end() as i128 - *self.range.start() as i128 + 1) as u128
    }
}

impl Default for RandomIdGenerator {
    fn default() -> Self {
        Self::new(Id::MIN.0..=Id::MAX.0, RandomOverflow::default())
    }
}

#[async_trait]
impl IdGenerator for RandomIdGenerator {
    async fn next_id(&self) -> Option<Id> {
        if self.range.is_empty() {
            return None;
        }
        let mut issued = self.issued.lock().await;
        if issued.len() as u128 >= self.span() {
            match self.overflow {
                RandomOverflow::Stop => return None,
                RandomOverflow::ResetList => issued.clear(),
            }
        }
        loop {
            let id = rand::random_range(self.range.clone());
            if issued.insert(id) {
                return Some(Id(id));
            }
        }
    }

    async fn reset(&self) {
        self.issued.lock().await.clear();
    }
}

/// The type of ID generator to use for a session's requests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum IdGeneratorType {
    /// [`RandomIdGenerator`] over the protocol range, starting a new epoch when exhausted.
    #[default]
    Random,
    /// [`SequentialIdGenerator`] over the protocol range, wrapping to the minimum.
    Sequential,
}

/// Creates a new [`IdGenerator`] for the given type.
pub fn new_id_generator(generator_type: IdGeneratorType) -> Box<dyn IdGenerator> {
    match generator_type {
        IdGeneratorType::Random => Box::new(RandomIdGenerator::default()),
        IdGeneratorType::Sequential => Box::new(SequentialIdGenerator::default()),
    }
}

#[cfg(test)]
mod id_test {
    use std::sync::Arc;

    use crate::core::{
        hash::HashSet,
        id::{
            Id,
            IdGenerator,
            RandomIdGenerator,
            RandomOverflow,
            SequentialIdGenerator,
            SequentialOverflow,
        },
    };

    async fn collect<G>(generator: &G, n: usize) -> Vec<Option<Id>>
    where
        G: IdGenerator,
    {
        let mut ids = Vec::with_capacity(n);
        for _ in 0..n {
            ids.push(generator.next_id().await);
        }
        ids
    }

    fn ids(values: &[i64]) -> Vec<Option<Id>> {
        values.iter().map(|value| Some(Id::from(*value))).collect()
    }

    #[tokio::test]
    async fn sequential_wraps_to_min() {
        let generator = SequentialIdGenerator::new(1, 4, SequentialOverflow::ResetToMin);
        assert_eq!(collect(&generator, 6).await, ids(&[2, 3, 4, 1, 2, 3]));
    }

    #[tokio::test]
    async fn sequential_never_leaves_range_when_wrapping_to_min() {
        let generator = SequentialIdGenerator::new(1, 10, SequentialOverflow::ResetToMin);
        for id in collect(&generator, 100).await {
            assert_matches::assert_matches!(id, Some(id) => {
                assert!(id.value() >= 1 && id.value() <= 10);
            });
        }
    }

    #[tokio::test]
    async fn sequential_wraps_to_zero() {
        let generator = SequentialIdGenerator::new(5, 6, SequentialOverflow::ResetToZero);
        assert_eq!(collect(&generator, 4).await, ids(&[6, 0, 1, 2]));
    }

    #[tokio::test]
    async fn sequential_wraps_to_smallest_negative() {
        let generator =
            SequentialIdGenerator::new(0, 1, SequentialOverflow::ResetToSmallestNegative);
        assert_eq!(
            collect(&generator, 3).await,
            ids(&[1, i64::MIN, i64::MIN + 1])
        );
    }

    #[tokio::test]
    async fn sequential_stops_when_exhausted() {
        let generator = SequentialIdGenerator::new(1, 3, SequentialOverflow::Stop);
        assert_eq!(
            collect(&generator, 5).await,
            vec![Some(Id::from(2)), Some(Id::from(3)), None, None, None]
        );
        generator.reset().await;
        assert_eq!(generator.next_id().await, Some(Id::from(2)));
    }

    #[tokio::test]
    async fn sequential_handles_integer_overflow() {
        let generator = SequentialIdGenerator::new(i64::MAX - 1, i64::MAX, SequentialOverflow::Stop);
        assert_eq!(generator.next_id().await, Some(Id::from(i64::MAX)));
        assert_eq!(generator.next_id().await, None);
    }

    #[tokio::test]
    async fn random_generates_distinct_ids_in_range() {
        let generator = RandomIdGenerator::new(10..=1009, RandomOverflow::ResetList);
        let ids = collect(&generator, 999).await;
        let mut seen = HashSet::default();
        for id in ids {
            assert_matches::assert_matches!(id, Some(id) => {
                assert!(id.value() >= 10 && id.value() <= 1009);
                assert!(seen.insert(id), "{id} was generated twice");
            });
        }
    }

    #[tokio::test]
    async fn random_starts_new_epoch_when_range_is_used_up() {
        let generator = RandomIdGenerator::new(1..=3, RandomOverflow::ResetList);
        let first_epoch = collect(&generator, 3).await;
        let mut first_epoch = first_epoch.into_iter().flatten().collect::<Vec<_>>();
        first_epoch.sort();
        assert_eq!(first_epoch, vec![Id::from(1), Id::from(2), Id::from(3)]);

        let second_epoch = collect(&generator, 3).await;
        let mut second_epoch = second_epoch.into_iter().flatten().collect::<Vec<_>>();
        second_epoch.sort();
        assert_eq!(second_epoch, first_epoch);
    }

    #[tokio::test]
    async fn random_stops_when_range_is_used_up() {
        let generator = RandomIdGenerator::new(7..=8, RandomOverflow::Stop);
        assert_matches::assert_matches!(generator.next_id().await, Some(_));
        assert_matches::assert_matches!(generator.next_id().await, Some(_));
        assert_matches::assert_matches!(generator.next_id().await, None);
        generator.reset().await;
        assert_matches::assert_matches!(generator.next_id().await, Some(_));
    }

    #[tokio::test]
    async fn random_is_safe_under_concurrent_use() {
        let generator = Arc::new(RandomIdGenerator::new(1..=500, RandomOverflow::Stop));
        let tasks = (0..10)
            .map(|_| {
                let generator = generator.clone();
                tokio::spawn(async move { collect(generator.as_ref(), 50).await })
            })
            .collect::<Vec<_>>();
        let mut seen = HashSet::default();
        for task in tasks {
            for id in task.await.unwrap() {
                assert!(seen.insert(id.unwrap()));
            }
        }
        assert_eq!(seen.len(), 500);
        assert_eq!(generator.next_id().await, None);
    }

    #[test]
    fn protocol_range() {
        assert!(Id::MIN.in_protocol_range());
        assert!(Id::MAX.in_protocol_range());
        assert!(!Id::from(0).in_protocol_range());
        assert!(!Id::from(9007199254740993).in_protocol_range());
    }
}
