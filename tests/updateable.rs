//! Incremental-update correctness: equivalence with from-scratch runs,
//! undo round-trips, and reinit fallbacks.

use powervor::{
    compute_tessellation, compute_tessellation_with, Ball, PeriodicBox, Settings, Tessellation,
    UpdateableTessellation,
};

macro_rules! assert_approx {
    ($actual:expr, $expected:expr, $eps:expr, $($arg:tt)*) => {
        let actual = $actual;
        let expected = $expected;
        let diff = (actual - expected).abs();
        assert!(
            diff < $eps,
            "{}: expected {}, got {} (diff={})",
            format!($($arg)*),
            expected,
            actual,
            diff
        );
    };
}

/// Deterministic jittered lattice of `nx * ny * nz` balls. Jitter and radius
/// spread are kept small enough that only near-neighbors collide, so single
/// sphere moves stay under the container's full-reinit threshold.
fn lattice_balls(nx: usize, ny: usize, nz: usize, spacing: f64) -> Vec<Ball> {
    let mut balls = Vec::with_capacity(nx * ny * nz);
    for ix in 0..nx {
        for iy in 0..ny {
            for iz in 0..nz {
                let seed = (ix * 131 + iy * 17 + iz * 7) as f64;
                let jitter = 0.12 * seed.sin();
                balls.push(Ball::new(
                    spacing * ix as f64 + jitter,
                    spacing * iy as f64 + 0.1 * seed.cos(),
                    spacing * iz as f64 - jitter,
                    1.0 + 0.15 * (seed * 0.5).sin().abs(),
                ));
            }
        }
    }
    balls
}

/// Compare two tessellations contact-by-contact and cell-by-cell after
/// sorting contacts by id pair.
fn assert_same_tessellation(left: &Tessellation, right: &Tessellation, eps: f64, context: &str) {
    let mut lc = left.contacts.clone();
    let mut rc = right.contacts.clone();
    lc.sort_by_key(|c| (c.id_a, c.id_b));
    rc.sort_by_key(|c| (c.id_a, c.id_b));

    assert_eq!(lc.len(), rc.len(), "{context}: contact count");
    for (l, r) in lc.iter().zip(rc.iter()) {
        assert_eq!((l.id_a, l.id_b), (r.id_a, r.id_b), "{context}: contact ids");
        assert_approx!(l.area, r.area, eps, "{context}: contact {}-{} area", l.id_a, l.id_b);
        assert_approx!(
            l.arc_length,
            r.arc_length,
            eps,
            "{context}: contact {}-{} arc",
            l.id_a,
            l.id_b
        );
        assert_approx!(
            l.solid_angle_a,
            r.solid_angle_a,
            eps,
            "{context}: contact {}-{} solid angle a",
            l.id_a,
            l.id_b
        );
        assert_approx!(
            l.pyramid_volume_b,
            r.pyramid_volume_b,
            eps,
            "{context}: contact {}-{} pyramid volume b",
            l.id_a,
            l.id_b
        );
    }

    let mut lcells = left.cells.clone();
    let mut rcells = right.cells.clone();
    lcells.sort_by_key(|c| c.id);
    rcells.sort_by_key(|c| c.id);
    assert_eq!(lcells.len(), rcells.len(), "{context}: cell count");
    for (l, r) in lcells.iter().zip(rcells.iter()) {
        assert_eq!(l.id, r.id, "{context}: cell ids");
        assert_approx!(l.sas_area, r.sas_area, eps, "{context}: cell {} SAS", l.id);
        assert_approx!(l.volume, r.volume, eps, "{context}: cell {} volume", l.id);
    }
}

#[test]
fn init_matches_one_shot_computation() {
    let balls = lattice_balls(3, 3, 3, 2.2);

    let mut tess = UpdateableTessellation::new();
    tess.init(&balls, 0.7, None).unwrap();

    let one_shot = compute_tessellation(&balls, 0.7).unwrap();
    assert_same_tessellation(&tess.summary(), &one_shot, 1e-9, "init vs one-shot");
}

#[test]
fn incremental_update_matches_fresh_init() {
    let mut balls = lattice_balls(4, 4, 3, 2.7);

    let mut tess = UpdateableTessellation::new();
    tess.init(&balls, 0.5, None).unwrap();

    // Nudge two spheres in a 48-sphere system: well under the reinit
    // threshold.
    balls[5].x += 0.3;
    balls[5].y -= 0.1;
    balls[20].z += 0.25;
    assert!(tess.update_with_changed(&balls, &[5, 20]));
    assert!(!tess.last_update_was_full_reinit());

    let fresh = compute_tessellation(&balls, 0.5).unwrap();
    assert_same_tessellation(&tess.summary(), &fresh, 1e-9, "incremental vs fresh");
}

#[test]
fn diffed_update_matches_explicit_ids() {
    let mut balls = lattice_balls(3, 3, 2, 2.6);

    let mut by_diff = UpdateableTessellation::new();
    by_diff.init(&balls, 0.6, None).unwrap();
    let mut by_ids = UpdateableTessellation::new();
    by_ids.init(&balls, 0.6, None).unwrap();

    balls[7].y += 0.4;
    assert!(by_diff.update(&balls));
    assert!(by_ids.update_with_changed(&balls, &[7]));
    assert_eq!(by_diff.changed_ids(), by_ids.changed_ids());

    assert_same_tessellation(&by_diff.summary(), &by_ids.summary(), 1e-12, "diff vs ids");
}

#[test]
fn massive_change_falls_back_to_full_reinit() {
    let mut balls = lattice_balls(3, 3, 3, 2.2);

    let mut tess = UpdateableTessellation::new();
    tess.init(&balls, 0.5, None).unwrap();

    for ball in &mut balls {
        ball.x += 1.1;
    }
    assert!(tess.update(&balls));
    assert!(tess.last_update_was_full_reinit());

    let fresh = compute_tessellation(&balls, 0.5).unwrap();
    assert_same_tessellation(&tess.summary(), &fresh, 1e-12, "reinit vs fresh");
}

#[test]
fn undo_reproduces_pre_update_state() {
    let mut balls = lattice_balls(3, 3, 2, 2.6);

    let mut tess = UpdateableTessellation::with_backup();
    tess.init(&balls, 0.6, None).unwrap();
    let after_init = tess.summary();

    balls[3].x += 0.3;
    balls[11].z -= 0.2;
    assert!(tess.update_with_changed(&balls, &[3, 11]));

    assert!(tess.restore());
    assert_same_tessellation(&tess.summary(), &after_init, 1e-12, "undo vs post-init");

    // The backup is consumed; a second restore is a no-op.
    assert!(!tess.restore());
}

#[test]
fn update_after_undo_works() {
    let mut balls = lattice_balls(2, 2, 2, 2.2);

    let mut tess = UpdateableTessellation::with_backup();
    tess.init(&balls, 0.6, None).unwrap();

    balls[0].x += 0.2;
    assert!(tess.update_with_changed(&balls, &[0]));
    assert!(tess.restore());

    assert!(tess.update_with_changed(&balls, &[0]));
    let fresh = compute_tessellation(&balls, 0.6).unwrap();
    assert_same_tessellation(&tess.summary(), &fresh, 1e-9, "update after undo");
}

#[test]
fn periodic_updateable_matches_one_shot() {
    let mut balls = lattice_balls(3, 3, 3, 2.4);
    let pbox = PeriodicBox::from_corners((-1.2, -1.2, -1.2), (6.0, 6.0, 6.0));

    let mut tess = UpdateableTessellation::new();
    tess.init(&balls, 0.4, Some(&pbox)).unwrap();

    let settings = Settings {
        probe: 0.4,
        periodic_box: Some(pbox),
        ..Settings::default()
    };
    let one_shot = compute_tessellation_with(&balls, &settings).unwrap();
    assert_same_tessellation(&tess.summary(), &one_shot, 1e-9, "periodic init");

    balls[13].x += 0.3;
    assert!(tess.update_with_changed(&balls, &[13]));
    assert!(!tess.last_update_was_full_reinit());

    let fresh = compute_tessellation_with(&balls, &settings).unwrap();
    assert_same_tessellation(&tess.summary(), &fresh, 1e-9, "periodic incremental");
}
