//! Database seeder for Lexledger development and testing.
//!
//! Seeds a demo client with a retainer and an expense advance, a lawyer with
//! a cash advance, and a few expenses charged through the bridge.
//!
//! Usage: cargo run --bin seeder

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use lexledger_core::advance::{
    AdvanceKind, AdvanceService, AdvanceStore, ExpenseFunding, NewAdvance, NewExpense,
    validation::validate_new_advance,
};
use lexledger_db::AdvanceRepository;
use lexledger_shared::types::{AdvanceId, ClientId, LawyerId, MatterId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Demo client ID (consistent for all seeds)
const DEMO_CLIENT_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0001);
/// Demo matter ID
const DEMO_MATTER_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0002);
/// Demo lawyer ID
const DEMO_LAWYER_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0003);

/// Seeded entries: (id, kind, matter-scoped, amount, date, description).
const ENTRIES: [(u128, AdvanceKind, bool, Decimal, (i32, u32, u32), &str); 4] = [
    (0x10, AdvanceKind::ClientRetainer, false, dec!(5000.00), (2026, 1, 5), "General retainer"),
    (
        0x11,
        AdvanceKind::ClientExpenseAdvance,
        true,
        dec!(1200.00),
        (2026, 1, 12),
        "Court costs deposit",
    ),
    (0x12, AdvanceKind::LawyerAdvance, false, dec!(800.00), (2026, 2, 1), "Travel float"),
    (
        0x13,
        AdvanceKind::FeePaymentConsultation,
        false,
        dec!(250.00),
        (2026, 2, 3),
        "Initial consultation",
    ),
];

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL must be set in environment");
        std::process::exit(1);
    };

    println!("Connecting to database...");
    let db = match lexledger_db::connect(&database_url).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to connect to database: {e}");
            std::process::exit(1);
        }
    };
    let store = Arc::new(AdvanceRepository::new(db));

    println!("Seeding ledger entries...");
    let inserted = seed_entries(store.as_ref()).await;

    if inserted == 0 {
        println!("  Entries already exist, skipping expenses...");
    } else {
        println!("Seeding expenses...");
        seed_expenses(&AdvanceService::new(store)).await;
    }

    println!("Seeding complete!");
}

/// Inserts the demo entries with fixed IDs; existing ones are left alone.
async fn seed_entries(store: &dyn AdvanceStore) -> usize {
    let mut inserted = 0;

    for (id, kind, matter_scoped, amount, (y, m, d), description) in ENTRIES {
        let id = AdvanceId::from_uuid(Uuid::from_u128(id));
        if matches!(store.find_advance(id).await, Ok(Some(_))) {
            continue;
        }

        let lawyer_entry = kind == AdvanceKind::LawyerAdvance;
        let input = NewAdvance {
            kind,
            client_id: (!lawyer_entry).then_some(ClientId::from_uuid(DEMO_CLIENT_ID)),
            matter_id: matter_scoped.then_some(MatterId::from_uuid(DEMO_MATTER_ID)),
            lawyer_id: lawyer_entry.then_some(LawyerId::from_uuid(DEMO_LAWYER_ID)),
            amount,
            currency: "USD".to_string(),
            date_received: NaiveDate::from_ymd_opt(y, m, d),
            description: Some(description.to_string()),
        };

        let result = match validate_new_advance(&input, id, Utc::now()) {
            Ok(advance) => store.insert_advance(advance).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(_) => inserted += 1,
            Err(e) => eprintln!("Failed to insert {kind} entry: {e}"),
        }
    }

    println!("  Inserted {inserted} ledger entries");
    inserted
}

/// Charges a few expenses through the bridge.
async fn seed_expenses(service: &AdvanceService) {
    let client = Some(ClientId::from_uuid(DEMO_CLIENT_ID));
    let matter = Some(MatterId::from_uuid(DEMO_MATTER_ID));
    let lawyer = Some(LawyerId::from_uuid(DEMO_LAWYER_ID));

    let expenses = [
        (
            client,
            matter,
            None,
            dec!(180.00),
            "Filing fee",
            false,
            ExpenseFunding::ClientExpenseAdvance,
        ),
        (
            None,
            None,
            lawyer,
            dec!(320.00),
            "Train to hearing",
            false,
            ExpenseFunding::LawyerAdvance,
        ),
        (None, None, lawyer, dec!(95.00), "Courier paid personally", true, ExpenseFunding::None),
    ];

    let mut inserted = 0;
    for (client_id, matter_id, lawyer_id, amount, description, paid_by_lawyer, funding) in
        expenses
    {
        let input = NewExpense {
            client_id,
            matter_id,
            lawyer_id,
            amount,
            currency: "USD".to_string(),
            description: description.to_string(),
            expense_date: None,
            paid_by_lawyer,
            funding,
        };

        match service.add_expense_with_deduction(&input).await {
            Ok(_) => inserted += 1,
            Err(e) => eprintln!("Failed to record expense {description}: {e}"),
        }
    }

    println!("  Recorded {inserted} expenses");
}
