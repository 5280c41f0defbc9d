use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::{open_model, Generator, GeneratorConfig, GeneratorError, Model};

fn load(path: &str) -> Arc<Model> {
    let _ = env_logger::try_init();
    Arc::new(open_model(path).expect("error opening model"))
}

fn lines(out: &[u8]) -> Vec<String> {
    String::from_utf8(out.to_vec())
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect()
}

#[test]
fn test_two_vertex_end_to_end() {
    let model = load("test-data/two-vertex.eip");
    let config = GeneratorConfig::default()
        .target_count(10)
        .max_per_state(1000);
    let generator = Generator::new(model, config).unwrap();

    let mut out = Vec::new();
    let summary = generator
        .run(StdRng::seed_from_u64(2018), &mut out)
        .unwrap();

    assert_eq!(summary.states, 2);
    assert_eq!(summary.batches, 2);
    assert_eq!(summary.addresses, 10);
    assert!((summary.probability_mass - 1.0).abs() < 1e-12);
    assert_eq!(summary.traversal.unreachable, 0);

    let addresses = lines(&out);
    assert_eq!(addresses.len(), 10);

    let mut low = 0;
    let mut high = 0;
    for address in &addresses {
        assert_eq!(address.len(), 32, "{address}");
        assert!(address.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
        match u32::from_str_radix(&address[..4], 16).unwrap() {
            0..=7 => low += 1,
            8..=15 => high += 1,
            other => panic!("segment A out of range: {other:x} in {address}"),
        }
        let rest = u32::from_str_radix(&address[4..], 16).unwrap();
        assert!(rest <= 0xff_ffff, "{address}");
    }
    assert_eq!((low, high), (6, 4));
}

#[test]
fn test_verbose_output() {
    let model = load("test-data/two-vertex.eip");
    let config = GeneratorConfig::default().target_count(10).verbose(true);
    let generator = Generator::new(model, config).unwrap();

    let mut out = Vec::new();
    let summary = generator.run(StdRng::seed_from_u64(1), &mut out).unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("A:\n  parents: []\n"), "{text}");
    assert!(text.contains("B:\n  parents: ['A']\n"), "{text}");
    assert!(text.ends_with(&format!("{summary}\n")), "{text}");
    assert!(text.contains("Psum=1.000000"), "{text}");
}

#[test]
fn test_three_vertex_run() {
    let model = load("test-data/three-vertex.eip");
    let config = GeneratorConfig::default().target_count(1000).parallel_depth(2);
    let generator = Generator::new(model.clone(), config).unwrap();

    let mut out = Vec::new();
    let summary = generator.run(StdRng::seed_from_u64(5), &mut out).unwrap();

    // A=1,B=0,C=0 has probability 0 and is pruned by the derived threshold
    assert_eq!(summary.states, 11);
    assert_eq!(summary.traversal.pruned, 1);
    assert!((summary.probability_mass - 1.0).abs() < 1e-9);
    assert!(summary.batches >= 1 && summary.batches <= summary.states);

    let addresses = lines(&out);
    assert_eq!(addresses.len() as u64, summary.addresses);
    assert!(summary.addresses <= 1000);
    for address in &addresses {
        assert_eq!(address.len(), model.address_width());
        let prefix = &address[..8];
        let a = u32::from_str_radix(prefix, 16).unwrap();
        assert!(
            a == 0x2001_0db8
                || (0x2a00_0000..=0x2a00_ffff).contains(&a)
                || (0xfe80_0000..=0xfe80_00ff).contains(&a),
            "{address}"
        );
    }
}

#[test]
fn test_max_per_state_caps_output() {
    let model = load("test-data/two-vertex.eip");
    let config = GeneratorConfig::default().target_count(100).max_per_state(5);
    let generator = Generator::new(model, config).unwrap();

    let mut out = Vec::new();
    let summary = generator.run(StdRng::seed_from_u64(11), &mut out).unwrap();
    assert_eq!(summary.batches, 2);
    assert_eq!(summary.addresses, 10);
    assert_eq!(lines(&out).len(), 10);
}

#[test]
fn test_unreachable_states_are_counted() {
    let model = load("test-data/unseen-parent.eip");
    let config = GeneratorConfig::default().target_count(10);
    let generator = Generator::new(model, config).unwrap();

    let mut out = Vec::new();
    let summary = generator.run(StdRng::seed_from_u64(3), &mut out).unwrap();
    assert_eq!(summary.states, 1);
    assert_eq!(summary.traversal.unreachable, 1);
    assert!((summary.probability_mass - 0.8).abs() < 1e-12);
    // budget 8, but the state covers a single address
    assert_eq!(summary.addresses, 1);
    assert_eq!(
        lines(&out),
        vec!["20010db8000000000000000000000001".to_owned()]
    );
}

#[test]
fn test_bounded_queue_run() {
    let model = load("test-data/three-vertex.eip");
    let unbounded = GeneratorConfig::default().target_count(1000);
    let bounded = unbounded.queue_capacity(2);

    let mut out = Vec::new();
    let a = Generator::new(model.clone(), unbounded)
        .unwrap()
        .run(StdRng::seed_from_u64(1), &mut out)
        .unwrap();
    let b = Generator::new(model, bounded)
        .unwrap()
        .run(StdRng::seed_from_u64(1), &mut out)
        .unwrap();
    assert_eq!(a.states, b.states);
    assert!((a.probability_mass - b.probability_mass).abs() < 1e-9);
}

#[test]
fn test_invalid_config_is_rejected() {
    let model = load("test-data/two-vertex.eip");
    let err = Generator::new(model, GeneratorConfig::default().target_count(0)).unwrap_err();
    assert!(matches!(err, GeneratorError::InvalidConfig { .. }), "{err:?}");
}

#[test]
fn test_run_from_global_pool_workers() {
    let model = load("test-data/two-vertex.eip");
    let workers = rayon::current_num_threads();
    let barrier = Arc::new(std::sync::Barrier::new(workers));
    let (done_tx, done_rx) = crossbeam_channel::unbounded();

    for seed in 0..workers as u64 {
        let model = model.clone();
        let barrier = Arc::clone(&barrier);
        let done_tx = done_tx.clone();
        rayon::spawn(move || {
            barrier.wait();
            let generator =
                Generator::new(model, GeneratorConfig::default().target_count(10)).unwrap();
            let mut out = Vec::new();
            let summary = generator
                .run(StdRng::seed_from_u64(seed), &mut out)
                .unwrap();
            let _ = done_tx.send(summary.addresses);
        });
    }

    for _ in 0..workers {
        let addresses = done_rx
            .recv_timeout(std::time::Duration::from_secs(20))
            .expect("generator run stalled on a global pool worker");
        assert_eq!(addresses, 10);
    }
}

#[test]
fn test_negative_threshold_keeps_every_state() {
    let model = load("test-data/three-vertex.eip");
    let config = GeneratorConfig::default()
        .target_count(1000)
        .min_state_probability(-1.0);
    let generator = Generator::new(model, config).unwrap();

    let mut out = Vec::new();
    let summary = generator.run(StdRng::seed_from_u64(5), &mut out).unwrap();
    assert_eq!(summary.states, 12);
    assert_eq!(summary.traversal.pruned, 0);
}
