// src/candidate_generation/candidate_generation.rs

use log::{debug, warn};
use std::collections::{HashMap, HashSet};

use crate::matching::normalize::{first_token, normalize_plot_id};
use crate::models::core::{Parcel, TextRecord};
use crate::utils::config::ReconcileConfig;

/// Blocking buckets for the records of one village. Buckets hold indices
/// into the caller's record slice.
#[derive(Debug, Default)]
struct VillageBlock {
    all: Vec<usize>,
    by_owner_token: HashMap<String, Vec<usize>>,
    by_plot_prefix: HashMap<String, Vec<usize>>,
}

fn plot_prefix(plot_id: &Option<String>, len: usize) -> Option<String> {
    let normalized = normalize_plot_id(plot_id.as_deref()?);
    if normalized.is_empty() {
        None
    } else {
        Some(normalized.chars().take(len).collect())
    }
}

#[derive(Debug)]
pub struct BlockingIndex {
    villages: HashMap<String, VillageBlock>,
    plot_prefix_len: usize,
    /// Records dropped for an empty id.
    pub skipped_records: usize,
    /// Records dropped because their id was already indexed.
    pub duplicate_records: usize,
}

impl BlockingIndex {
    pub fn build(records: &[TextRecord], plot_prefix_len: usize) -> Self {
        let mut index = BlockingIndex {
            villages: HashMap::new(),
            plot_prefix_len,
            skipped_records: 0,
            duplicate_records: 0,
        };
        let mut seen: HashSet<&str> = HashSet::new();

        for (i, record) in records.iter().enumerate() {
            if record.id.trim().is_empty() {
                index.skipped_records += 1;
                continue;
            }
            if !seen.insert(record.id.as_str()) {
                index.duplicate_records += 1;
                continue;
            }
            let block = index.villages.entry(record.village_id.clone()).or_default();
            block.all.push(i);
            if let Some(token) = first_token(&record.owner_name) {
                block.by_owner_token.entry(token).or_default().push(i);
            }
            if let Some(prefix) = plot_prefix(&record.plot_id, plot_prefix_len) {
                block.by_plot_prefix.entry(prefix).or_default().push(i);
            }
        }

        if index.skipped_records > 0 {
            warn!("Skipped {} text records with an empty id", index.skipped_records);
        }
        debug!(
            "Built blocking index over {} villages ({} duplicate record ids ignored)",
            index.villages.len(),
            index.duplicate_records
        );
        index
    }

    /// Record indices worth scoring against `parcel`, in input order.
    /// Falls back to the whole village when no blocking key overlaps.
    pub fn candidates_for(&self, parcel: &Parcel) -> Vec<usize> {
        let Some(block) = self.villages.get(&parcel.village_id) else {
            return Vec::new();
        };

        let mut hits: Vec<usize> = Vec::new();
        if let Some(bucket) = first_token(&parcel.owner_name).and_then(|t| block.by_owner_token.get(&t)) {
            hits.extend(bucket);
        }
        if let Some(bucket) =
            plot_prefix(&parcel.plot_id, self.plot_prefix_len).and_then(|p| block.by_plot_prefix.get(&p))
        {
            hits.extend(bucket);
        }

        if hits.is_empty() {
            return block.all.clone();
        }
        hits.sort_unstable();
        hits.dedup();
        hits
    }

    pub fn village_record_count(&self, village_id: &str) -> usize {
        self.villages.get(village_id).map_or(0, |b| b.all.len())
    }
}

/// Lazy stream of candidate pairs, one parcel's candidate list at a time.
/// Each (parcel, record) pair is yielded at most once.
pub struct CandidateStream<'a> {
    parcels: &'a [Parcel],
    records: &'a [TextRecord],
    index: BlockingIndex,
    village: Option<String>,
    next_parcel: usize,
    seen_parcels: HashSet<&'a str>,
    current: Option<(&'a Parcel, std::vec::IntoIter<usize>)>,
}

impl<'a> CandidateStream<'a> {
    /// Only yield parcels of the given village.
    pub fn restrict_to_village(mut self, village_id: &str) -> Self {
        self.village = Some(village_id.to_string());
        self
    }

    pub fn index(&self) -> &BlockingIndex {
        &self.index
    }

    fn accepts(&self, parcel: &Parcel) -> bool {
        !parcel.id.trim().is_empty() && self.village.as_deref().map_or(true, |v| parcel.village_id == v)
    }

    // Parcels the stream visits: in scope, non-empty id, first occurrence only.
    fn accepted_parcels(&self) -> impl Iterator<Item = &'a Parcel> + '_ {
        let mut seen: HashSet<&'a str> = HashSet::new();
        self.parcels
            .iter()
            .filter(move |p| self.accepts(p) && seen.insert(p.id.as_str()))
    }

    /// Number of distinct parcels the stream will pair up.
    pub fn parcel_count(&self) -> usize {
        self.accepted_parcels().count()
    }

    /// Number of pairs the stream will yield, without materialising them.
    pub fn count_pairs(&self) -> usize {
        self.accepted_parcels()
            .map(|p| self.index.candidates_for(p).len())
            .sum()
    }
}

impl<'a> Iterator for CandidateStream<'a> {
    type Item = (&'a Parcel, &'a TextRecord);

    fn next(&mut self) -> Option<Self::Item> {
        let (parcels, records) = (self.parcels, self.records);
        loop {
            if let Some((parcel, candidates)) = self.current.as_mut() {
                if let Some(i) = candidates.next() {
                    return Some((*parcel, &records[i]));
                }
                self.current = None;
            }

            let parcel = parcels.get(self.next_parcel)?;
            self.next_parcel += 1;
            if !self.accepts(parcel) {
                continue;
            }
            if !self.seen_parcels.insert(parcel.id.as_str()) {
                debug!("Ignoring duplicate parcel id {}", parcel.id);
                continue;
            }
            let candidates = self.index.candidates_for(parcel);
            self.current = Some((parcel, candidates.into_iter()));
        }
    }
}

pub fn generate_candidates<'a>(
    parcels: &'a [Parcel],
    text_records: &'a [TextRecord],
    config: &ReconcileConfig,
) -> CandidateStream<'a> {
    CandidateStream {
        parcels,
        records: text_records,
        index: BlockingIndex::build(text_records, config.plot_prefix_len),
        village: None,
        next_parcel: 0,
        seen_parcels: HashSet::new(),
        current: None,
    }
}
