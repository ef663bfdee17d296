use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::{ARCSEC_PER_DEGREE, PartitionKey, Position, ProjectionRow};

/// Distance between neighbouring objects generated by [`grid_rows`].
///
/// Much larger than any matching radius used in tests, so every object has a single plausible
/// counterpart.
pub const GRID_SPACING_ARCSEC: f64 = 30.0;

/// Creates a random number generator that always yields the same sequence for `seed`.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Generates `count` objects on a row of the sky starting at `origin`.
///
/// Objects are [`GRID_SPACING_ARCSEC`] apart along the longitude, nudged by a random offset of
/// at most a tenth of the spacing. Ids are `first_id`, `first_id + 1`, and so on.
pub fn grid_rows(
    rng: &mut StdRng,
    count: usize,
    origin: Position,
    first_id: i64,
    partition_key: PartitionKey,
) -> Vec<ProjectionRow> {
    let spacing_deg = GRID_SPACING_ARCSEC / ARCSEC_PER_DEGREE;

    (0..count)
        .map(|index| {
            let nudge = rng.gen_range(-0.1..0.1) * spacing_deg;
            let position = Position::new(
                origin.longitude + index as f64 * spacing_deg + nudge,
                origin.latitude + rng.gen_range(-0.1..0.1) * spacing_deg,
            );

            ProjectionRow::new(first_id + index as i64, position, partition_key)
        })
        .collect()
}

/// Returns the same objects observed again, each moved by less than `max_offset_arcsec`.
///
/// Ids are shifted by `id_offset` so that both observations carry distinct identifiers, while
/// partition keys are kept.
pub fn observe_again(
    rng: &mut StdRng,
    rows: &[ProjectionRow],
    max_offset_arcsec: f64,
    id_offset: i64,
) -> Vec<ProjectionRow> {
    rows.iter()
        .map(|row| {
            let position = jitter(rng, row.position, max_offset_arcsec);
            let id = row.id.as_str().parse::<i64>().map_or_else(
                |_| format!("{}-{id_offset}", row.id),
                |id| (id + id_offset).to_string(),
            );

            ProjectionRow::new(id, position, row.partition_key)
        })
        .collect()
}

/// Moves `position` by a random offset strictly smaller than `max_offset_arcsec`.
pub fn jitter(rng: &mut StdRng, position: Position, max_offset_arcsec: f64) -> Position {
    // Each axis stays below half the bound, so the combined offset stays below it.
    let max_deg = 0.5 * max_offset_arcsec / ARCSEC_PER_DEGREE;
    let cos_lat = position.latitude.to_radians().cos().max(1e-6);

    Position::new(
        position.longitude + rng.gen_range(-max_deg..max_deg) / cos_lat,
        position.latitude + rng.gen_range(-max_deg..max_deg),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_stays_within_bound() {
        let mut rng = seeded_rng(7);
        let origin = Position::new(150.0, 45.0);

        for _ in 0..500 {
            let moved = jitter(&mut rng, origin, 0.5);
            assert!(origin.separation_arcsec(&moved) < 0.5);
        }
    }

    #[test]
    fn test_grid_rows_are_well_separated() {
        let mut rng = seeded_rng(3);
        let rows = grid_rows(&mut rng, 20, Position::new(10.0, -5.0), 100, 4);

        assert_eq!(rows[0].id.as_str(), "100");
        assert_eq!(rows[19].id.as_str(), "119");
        for pair in rows.windows(2) {
            assert!(pair[0].position.separation_arcsec(&pair[1].position) > 0.5 * GRID_SPACING_ARCSEC);
        }
    }
}
