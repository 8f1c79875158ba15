use criterion::{Criterion, criterion_group, criterion_main};
use hybridnet::model::{BranchLength, Network};
use hybridnet::moves::{Move, MoveConfig, MoveKind};
use hybridnet::quartets::{PseudoLikelihood, QuartetCF, QuartetTable};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::hint::black_box;

const TAXA_COUNTS: &[usize] = &[8, 16, 32];

fn caterpillar(num_taxa: usize) -> Network {
    let mut net = Network::with_capacity(num_taxa);
    let root = net.add_internal();
    net.set_root(root).unwrap();
    let length = Some(BranchLength::new(0.5));
    let mut current = root;
    for i in 0..num_taxa - 2 {
        let leaf = net.add_leaf(format!("t{i}"));
        net.connect(current, leaf, length).unwrap();
        let next = net.add_internal();
        net.connect(current, next, length).unwrap();
        current = next;
    }
    for i in num_taxa - 2..num_taxa {
        let leaf = net.add_leaf(format!("t{i}"));
        net.connect(current, leaf, length).unwrap();
    }
    net.finalize().unwrap();
    net
}

// Consecutive 4-taxon windows, all supporting the caterpillar
fn table(num_taxa: usize) -> QuartetTable {
    let rows = (0..num_taxa - 3)
        .map(|i| {
            let taxa = [0, 1, 2, 3].map(|k| format!("t{}", i + k));
            QuartetCF::new(taxa.each_ref().map(String::as_str), [0.6, 0.2, 0.2])
        })
        .collect();
    QuartetTable::new(rows).unwrap()
}

fn move_and_rollback(c: &mut Criterion) {
    let config = MoveConfig::default().with_max_hybrids(4);
    for &n in TAXA_COUNTS {
        let mut net = caterpillar(n);
        let mut rng = StdRng::seed_from_u64(42);
        for kind in [MoveKind::AddHybrid, MoveKind::Nni] {
            c.bench_function(&format!("{kind}-rollback-n{n}"), |b| {
                b.iter(|| {
                    if let Ok(mv) = Move::propose(kind, &net, &config, &mut rng) {
                        if mv.apply(&mut net, &config).is_ok() {
                            net.rollback().unwrap();
                        }
                    }
                    black_box(&net);
                });
            });
        }
    }
}

fn scoring(c: &mut Criterion) {
    for &n in TAXA_COUNTS {
        let mut net = caterpillar(n);
        let table = table(n);
        let scorer = PseudoLikelihood::bind(&table, &net).unwrap();
        c.bench_function(&format!("score-tree-n{n}"), |b| {
            b.iter(|| black_box(scorer.score(&net).unwrap()));
        });

        let mut rng = StdRng::seed_from_u64(7);
        let config = MoveConfig::default();
        let mv = Move::propose(MoveKind::AddHybrid, &net, &config, &mut rng).unwrap();
        mv.apply(&mut net, &config).unwrap();
        net.commit().unwrap();
        c.bench_function(&format!("score-network-n{n}"), |b| {
            b.iter(|| black_box(scorer.score(&net).unwrap()));
        });
    }
}

criterion_group!(moves, move_and_rollback);
criterion_group! {
    name = scores;
    config = Criterion::default().sample_size(20);
    targets = scoring
}
criterion_main!(moves, scores);
