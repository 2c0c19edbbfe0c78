use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sanctions_screening::similarity::score;
use sanctions_screening::{screen, EntityFragment, EntityIndex, FragmentAttribute, ScreeningPolicy};

const WORDS: &[&str] = &[
    "global", "trading", "shipping", "holdings", "bank", "national", "petroleum", "industries",
    "group", "limited", "foundation", "aviation", "mining", "development", "export", "company",
];

fn synthetic_index(size: usize) -> EntityIndex {
    EntityIndex::from_fragments((0..size).flat_map(|i| {
        let name = format!(
            "{} {} {}",
            WORDS[i % WORDS.len()],
            WORDS[(i / 3) % WORDS.len()],
            WORDS[(i / 7) % WORDS.len()]
        );
        let alias = format!("{} {}", WORDS[(i / 5) % WORDS.len()], i);
        [
            EntityFragment {
                source_list: "OFAC-SDN".to_string(),
                entity_id: i.to_string(),
                attribute: FragmentAttribute::Primary(name),
            },
            EntityFragment {
                source_list: "OFAC-SDN".to_string(),
                entity_id: i.to_string(),
                attribute: FragmentAttribute::Alias(alias),
            },
        ]
    }))
}

fn bench_score(c: &mut Criterion) {
    c.bench_function("score_pair", |b| {
        b.iter(|| {
            score(
                black_box("Islamic Republic of Iran Shipping Lines"),
                black_box("IRAN SHIPPING LINES GROUP"),
            )
        })
    });
}

fn bench_screen(c: &mut Criterion) {
    let index = synthetic_index(10_000);
    let policy = ScreeningPolicy::default();

    c.bench_function("screen_10k_entities", |b| {
        b.iter(|| screen(black_box("National Petroleum Export Company"), &index, &policy))
    });
}

criterion_group!(benches, bench_score, bench_screen);
criterion_main!(benches);
