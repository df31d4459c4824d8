use crate::application::context::RequestContext;
use crate::application::engine::BillingEngine;
use crate::domain::loan::{BorrowerId, NewBorrower};
use crate::error::Result;
use rand::Rng;
use rand::seq::SliceRandom;

const FIRST_NAMES: &[&str] = &[
    "Amara", "Bima", "Chen", "Dewi", "Elena", "Farid", "Gita", "Hugo", "Intan", "Joko", "Kirana",
    "Lukas", "Maya", "Nadia", "Omar", "Putri",
];

const LAST_NAMES: &[&str] = &[
    "Santoso", "Wijaya", "Tanaka", "Okafor", "Larsen", "Hakim", "Moreau", "Silva", "Kusuma",
    "Novak", "Pratama", "Reyes",
];

/// Builds `count` borrowers with plausible names, emails and phone numbers.
pub fn synthetic_borrowers<R: Rng>(count: u32, rng: &mut R) -> Vec<NewBorrower> {
    (1..=count)
        .map(|n| {
            let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Borrower");
            let last = LAST_NAMES.choose(rng).copied().unwrap_or("Seed");
            NewBorrower {
                name: format!("{first} {last}"),
                email: format!(
                    "{}.{}{n}@example.com",
                    first.to_lowercase(),
                    last.to_lowercase()
                ),
                phone: format!(
                    "+62-8{:02}-{:04}-{:04}",
                    rng.gen_range(10..100),
                    rng.gen_range(0..10_000),
                    rng.gen_range(0..10_000)
                ),
            }
        })
        .collect()
}

/// Registers `count` synthetic borrowers through the engine.
pub async fn seed_borrowers(
    engine: &BillingEngine,
    ctx: &RequestContext,
    count: u32,
) -> Result<Vec<BorrowerId>> {
    let borrowers = synthetic_borrowers(count, &mut rand::thread_rng());
    let mut ids = Vec::with_capacity(borrowers.len());
    for borrower in borrowers {
        ids.push(engine.register_borrower(ctx, borrower).await?);
    }
    Ok(ids)
}
