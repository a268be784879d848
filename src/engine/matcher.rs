use std::collections::{BTreeMap, HashMap};

use crate::models::{HashHit, MatchCandidate, SongRecord};

/// Songs with fewer raw hit pairs than this are never candidates.
pub const MIN_PAIR_SUPPORT: usize = 3;

struct SongHits {
    song: SongRecord,
    pairs: Vec<(f64, f64)>, // (query_time, stored_time)
}

/// Ranks index hits into candidate matches.
///
/// Hits are bucketed per song; for each song with at least MIN_PAIR_SUPPORT
/// pairs, the offsets `stored - query` are binned to 0.1 s and the most
/// populous bin drives the score. `query_hash_count` is the total number of
/// hashes in the query, matched or not.
pub fn rank(hits: Vec<HashHit>, query_hash_count: usize) -> Vec<MatchCandidate> {
    if query_hash_count == 0 {
        return Vec::new();
    }

    let mut buckets: HashMap<i64, SongHits> = HashMap::new();
    for hit in hits {
        buckets
            .entry(hit.song.id)
            .or_insert_with(|| SongHits { song: hit.song.clone(), pairs: Vec::new() })
            .pairs
            .push((hit.query_time, hit.stored_time));
    }

    let mut candidates = Vec::new();
    for (_, bucket) in buckets {
        if bucket.pairs.len() < MIN_PAIR_SUPPORT {
            continue;
        }

        // Alignment histogram over decisecond bins. BTreeMap iteration is
        // ascending, so the first bin with the top count is the smallest
        // qualifying offset.
        let mut histogram: BTreeMap<i64, usize> = BTreeMap::new();
        for &(query_time, stored_time) in &bucket.pairs {
            let bin = ((stored_time - query_time) * 10.0).round() as i64;
            *histogram.entry(bin).or_insert(0) += 1;
        }

        let (mut best_bin, mut coherent) = (0i64, 0usize);
        for (&bin, &count) in &histogram {
            if count > coherent {
                best_bin = bin;
                coherent = count;
            }
        }

        let total = bucket.pairs.len();
        let coherence = coherent as f64 / total as f64;
        let strength = coherent as f64 / query_hash_count as f64;

        candidates.push(MatchCandidate {
            song: bucket.song,
            confidence: (coherence * 0.6 + strength * 0.4) * 100.0,
            coherent_matches: coherent,
            total_matches: total,
            song_offset: best_bin as f64 / 10.0,
        });
    }

    candidates.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| b.coherent_matches.cmp(&a.coherent_matches))
            .then_with(|| a.song.id.cmp(&b.song.id))
    });
    candidates
}
