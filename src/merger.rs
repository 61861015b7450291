//! Binary heap merger.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::io;

use log;

use crate::key::KeyExtractor;
use crate::order::SortOrder;
use crate::sort::SortError;

/// Head record of a merged source.
struct MergeEntry {
    source: usize,
    key: Vec<u8>,
    record: Vec<u8>,
    /// Arrival order of the source the record belongs to.
    stamp: u64,
    order: SortOrder,
}

impl MergeEntry {
    /// Ordering in which entries are emitted. [`Ordering::Less`] means `self` goes first.
    fn rank(&self, other: &Self) -> Ordering {
        if self.order.stable {
            self.order
                .compare_keys(&self.key, &other.key)
                .then_with(|| self.stamp.cmp(&other.stamp))
        } else {
            self.order
                .compare_unstable((&self.key[..], &self.record[..]), (&other.key[..], &other.record[..]))
        }
    }
}

impl Ord for MergeEntry {
    // binary heap is max-heap by default so the ranking is reversed to make it min-heap
    fn cmp(&self, other: &Self) -> Ordering {
        other.rank(self)
    }
}

impl PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for MergeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MergeEntry {}

/// Binary heap merger implementation.
/// Merges multiple sorted line sources into a single sorted stream of records.
/// Time complexity is *m* \* log(*n*) in worst case where *m* is the number of records,
/// *n* is the number of sources.
///
/// Only the head record of every source is kept in memory. A source is dropped as soon as it is exhausted.
pub struct BinaryHeapMerger<S>
where
    S: Iterator<Item = io::Result<Vec<u8>>>,
{
    items: BinaryHeap<MergeEntry>,
    sources: Vec<Option<S>>,
    /// Arrival order of every source admitted into the merge so far.
    stamps: HashMap<usize, u64>,
    extractor: KeyExtractor,
    order: SortOrder,
    initiated: bool,
}

impl<S> BinaryHeapMerger<S>
where
    S: Iterator<Item = io::Result<Vec<u8>>>,
{
    /// Creates an instance of a binary heap merger.
    /// Source records should be sorted according to `order` otherwise the result is undefined.
    ///
    /// # Arguments
    /// * `sources` - Sorted sources to be merged in a single sorted one
    /// * `extractor` - Record key extractor
    /// * `order` - Records ordering policy
    pub fn new<I>(sources: I, extractor: KeyExtractor, order: SortOrder) -> Self
    where
        I: IntoIterator<Item = S>,
    {
        let sources = Vec::from_iter(sources.into_iter().map(Some));
        let items = BinaryHeap::with_capacity(sources.len());

        return BinaryHeapMerger {
            items,
            sources,
            stamps: HashMap::new(),
            extractor,
            order,
            initiated: false,
        };
    }

    /// Number of sources not exhausted yet.
    pub fn active_sources(&self) -> usize {
        self.sources.iter().filter(|source| source.is_some()).count()
    }

    /// Pulls the next record of a source into the heap, retiring the source if it is exhausted.
    fn admit(&mut self, idx: usize) -> Result<(), SortError> {
        let item = match self.sources[idx].as_mut() {
            Some(source) => source.next(),
            None => None,
        };

        match item {
            Some(Ok(record)) => {
                let key = self.extractor.extract(&record)?;
                let next_stamp = self.stamps.len() as u64;
                let stamp = *self.stamps.entry(idx).or_insert(next_stamp);

                self.items.push(MergeEntry {
                    source: idx,
                    key,
                    record,
                    stamp,
                    order: self.order,
                });
            }
            Some(Err(err)) => return Err(SortError::IO(err)),
            None => {
                if self.sources[idx].take().is_some() {
                    log::trace!("merge source {} exhausted", idx);
                }
            }
        }

        return Ok(());
    }
}

impl<S> Iterator for BinaryHeapMerger<S>
where
    S: Iterator<Item = io::Result<Vec<u8>>>,
{
    type Item = Result<Vec<u8>, SortError>;

    /// Returns the next record from the sources in sort order.
    fn next(&mut self) -> Option<Self::Item> {
        if !self.initiated {
            self.initiated = true;
            for idx in 0..self.sources.len() {
                if let Err(err) = self.admit(idx) {
                    return Some(Err(err));
                }
            }
        }

        let entry = match self.items.pop() {
            Some(entry) => entry,
            None => {
                let active = self.active_sources();
                return if active > 0 {
                    Some(Err(SortError::UnmergedRuns(active)))
                } else {
                    None
                };
            }
        };

        if let Err(err) = self.admit(entry.source) {
            return Some(Err(err));
        }

        return Some(Ok(entry.record));
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, ErrorKind};

    use rstest::*;

    use super::BinaryHeapMerger;
    use crate::key::KeyExtractor;
    use crate::order::SortOrder;
    use crate::sort::SortError;

    fn source(records: Vec<&str>) -> std::vec::IntoIter<io::Result<Vec<u8>>> {
        Vec::from_iter(records.into_iter().map(|record| Ok(record.as_bytes().to_vec()))).into_iter()
    }

    fn merge(sources: Vec<Vec<&str>>, order: SortOrder) -> Vec<String> {
        let merger = BinaryHeapMerger::new(
            sources.into_iter().map(source),
            KeyExtractor::new(vec![0], ","),
            order,
        );
        let result: Result<Vec<Vec<u8>>, SortError> = merger.collect();
        Vec::from_iter(result.unwrap().into_iter().map(|record| String::from_utf8(record).unwrap()))
    }

    #[rstest]
    #[case(vec![], vec![])]
    #[case(vec![vec![], vec![]], vec![])]
    #[case(
        vec![vec!["4", "5", "7"], vec!["1", "6"], vec!["3"], vec![]],
        vec!["1", "3", "4", "5", "6", "7"],
    )]
    #[case(
        vec![vec!["1,a", "3,b"], vec!["2,c"]],
        vec!["1,a", "2,c", "3,b"],
    )]
    fn test_merger(#[case] sources: Vec<Vec<&str>>, #[case] expected: Vec<&str>) {
        assert_eq!(merge(sources, SortOrder::default()), expected);
    }

    #[test]
    fn test_merger_reversed() {
        let actual = merge(
            vec![vec!["7", "5", "4"], vec!["6", "1"], vec!["3"]],
            SortOrder::new(true, false),
        );
        assert_eq!(actual, vec!["7", "6", "5", "4", "3", "1"]);
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn test_merger_stability(#[case] reversed: bool) {
        let sources = if reversed {
            vec![vec!["2,a", "1,a"], vec!["2,b", "1,b"], vec!["1,c"]]
        } else {
            vec![vec!["1,a", "2,a"], vec!["1,b", "2,b"], vec!["1,c"]]
        };

        let actual = merge(sources, SortOrder::new(reversed, true));

        let expected = if reversed {
            vec!["2,a", "2,b", "1,a", "1,b", "1,c"]
        } else {
            vec!["1,a", "1,b", "1,c", "2,a", "2,b"]
        };
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_merger_stamps_skip_empty_sources() {
        let actual = merge(vec![vec![], vec!["5,y"], vec!["5,x"]], SortOrder::new(false, true));
        assert_eq!(actual, vec!["5,y", "5,x"]);
    }

    #[test]
    fn test_merger_source_error() {
        let failing = vec![
            Ok(b"3".to_vec()),
            Err(io::Error::new(ErrorKind::Other, "test error")),
        ]
        .into_iter();
        let merger = BinaryHeapMerger::new(
            vec![failing, source(vec!["1", "2"])],
            KeyExtractor::new(vec![0], ","),
            SortOrder::default(),
        );

        let actual = Vec::from_iter(merger.take(4));
        assert_eq!(actual.len(), 4);
        assert_eq!(actual[0].as_ref().unwrap(), b"1");
        assert_eq!(actual[1].as_ref().unwrap(), b"2");
        match &actual[2] {
            Err(SortError::IO(err)) => assert_eq!(err.to_string(), "test error"),
            other => panic!("unexpected result: {:?}", other),
        }
        // the failed source is still open when the heap runs dry
        match &actual[3] {
            Err(SortError::UnmergedRuns(count)) => assert_eq!(*count, 1),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_merger_raw_bytes() {
        let merger = BinaryHeapMerger::new(
            vec![
                vec![Ok(b"b,caf\xe9".to_vec())].into_iter(),
                vec![Ok(b"a,\xff".to_vec()), Ok(b"c,x".to_vec())].into_iter(),
            ],
            KeyExtractor::new(vec![0], ","),
            SortOrder::default(),
        );

        let result: Result<Vec<Vec<u8>>, SortError> = merger.collect();
        assert_eq!(
            result.unwrap(),
            vec![b"a,\xff".to_vec(), b"b,caf\xe9".to_vec(), b"c,x".to_vec()]
        );
    }

    #[test]
    fn test_merger_key_out_of_range() {
        let merger = BinaryHeapMerger::new(
            vec![source(vec!["a,b"]), source(vec!["c"])],
            KeyExtractor::new(vec![1], ","),
            SortOrder::default(),
        );

        let result: Result<Vec<Vec<u8>>, SortError> = merger.collect();
        match result {
            Err(SortError::KeyOutOfRange { column, record }) => {
                assert_eq!(column, 1);
                assert_eq!(record, b"c".to_vec());
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
