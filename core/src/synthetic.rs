//! Deterministic synthetic portfolio for demos and tests.
//!
//! RULE: All randomness flows through `RngSlot::Synthetic`, so the same
//! population parameters and seed always write the same rows.
//!
//! Each contract gets a latent risk from its satisfaction, renewal flag
//! and premium burden plus noise. The `cancelled` riskiest contracts are
//! cancelled; the rest are split between active and ended.

use crate::{
    error::{PipelineError, PipelineResult},
    rng::{PipelineRng, RngSlot},
    store::{ChurnStore, NewCancellation, NewClient, NewContract},
    types::ContractStatus,
};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

const DATE_FMT: &str = "%Y-%m-%d";

const INSURANCE_TYPES: [(&str, f64); 4] = [
    ("Auto", 180.0),
    ("Residencial", 90.0),
    ("Vida", 120.0),
    ("Saude", 420.0),
];
const SALES_CHANNELS: [&str; 4] = ["Corretor", "Online", "Agencia", "Telefone"];
const EDUCATION_LEVELS: [&str; 4] = ["Fundamental", "Medio", "Superior", "Pos-graduacao"];
const SATISFACTION_LEVELS: [&str; 3] = ["Baixa", "Media", "Alta"];
const CANCEL_REASONS: [&str; 4] = ["Preco", "Atendimento", "Concorrencia", "Mudanca de necessidade"];

const FIRST_NAMES: [&str; 16] = [
    "Ana", "Bruno", "Carla", "Diego", "Elisa", "Felipe", "Gabriela", "Henrique",
    "Isabela", "Joao", "Larissa", "Marcos", "Natalia", "Otavio", "Paula", "Rafael",
];
const LAST_NAMES: [&str; 12] = [
    "Silva", "Santos", "Oliveira", "Souza", "Lima", "Pereira",
    "Costa", "Almeida", "Ferreira", "Rodrigues", "Gomes", "Martins",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationSpec {
    pub contracts:         usize,
    /// Exactly this many contracts end up cancelled.
    pub cancelled:         usize,
    /// Share of non-cancelled contracts that have simply ended.
    pub ended_share:       f64,
    /// Share of clients reporting zero monthly income.
    pub zero_income_share: f64,
    /// Dates are generated relative to this day.
    pub as_of:             NaiveDate,
}

impl PopulationSpec {
    pub fn new(contracts: usize, cancelled: usize, as_of: NaiveDate) -> Self {
        Self {
            contracts,
            cancelled,
            ended_share: 0.15,
            zero_income_share: 0.03,
            as_of,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationReport {
    pub clients:   usize,
    pub contracts: usize,
    pub active:    usize,
    pub cancelled: usize,
    pub ended:     usize,
}

struct Draft {
    contract:   NewContract,
    start:      NaiveDate,
    risk:       f64,
}

/// Write a synthetic portfolio into `store` in a single transaction.
pub fn populate(store: &ChurnStore, spec: &PopulationSpec, seed: u64) -> PipelineResult<PopulationReport> {
    if spec.cancelled > spec.contracts {
        return Err(PipelineError::Config(format!(
            "cannot cancel {} of {} contracts", spec.cancelled, spec.contracts
        )));
    }
    let mut rng = PipelineRng::for_slot(seed, RngSlot::Synthetic);

    let n_clients = (spec.contracts * 4 / 5).max(1).min(spec.contracts.max(1));
    let clients: Vec<NewClient> = (0..n_clients)
        .map(|i| generate_client(i, spec, &mut rng))
        .collect();

    let mut drafts: Vec<Draft> = (0..spec.contracts)
        .map(|i| {
            let client = &clients[i % n_clients];
            generate_contract(i, client, spec, &mut rng)
        })
        .collect();

    // Riskiest first; earlier contracts win ties.
    let mut order: Vec<usize> = (0..drafts.len()).collect();
    order.sort_by(|&a, &b| drafts[b].risk.total_cmp(&drafts[a].risk).then(a.cmp(&b)));

    let mut cancellations = Vec::with_capacity(spec.cancelled);
    let mut report = PopulationReport {
        clients: n_clients,
        contracts: spec.contracts,
        active: 0,
        cancelled: 0,
        ended: 0,
    };

    for (rank, &idx) in order.iter().enumerate() {
        let draft = &mut drafts[idx];
        let tenure = (spec.as_of - draft.start).num_days().max(2);
        if rank < spec.cancelled {
            let after = 1 + rng.next_index((tenure - 1) as usize) as i64;
            let date = draft.start + Duration::days(after);
            draft.contract.status = ContractStatus::Cancelled;
            cancellations.push(NewCancellation {
                contract_id:       draft.contract.contract_id.clone(),
                cancellation_date: date.format(DATE_FMT).to_string(),
                reason:            Some(CANCEL_REASONS[rng.next_index(CANCEL_REASONS.len())].into()),
                channel:           Some(SALES_CHANNELS[rng.next_index(SALES_CHANNELS.len())].into()),
            });
            report.cancelled += 1;
        } else if rng.chance(spec.ended_share) {
            let after = 1 + rng.next_index((tenure - 1) as usize) as i64;
            draft.contract.status = ContractStatus::Ended;
            draft.contract.end_date = Some((draft.start + Duration::days(after)).format(DATE_FMT).to_string());
            report.ended += 1;
        } else {
            report.active += 1;
        }
    }

    store.with_transaction(|s| {
        for client in &clients {
            s.insert_client(client)?;
        }
        for draft in &drafts {
            s.insert_contract(&draft.contract)?;
        }
        for cancellation in &cancellations {
            s.insert_cancellation(cancellation)?;
        }
        Ok(())
    })?;

    log::info!(
        "synthetic: seed={seed} clients={} contracts={} active={} cancelled={} ended={}",
        report.clients, report.contracts, report.active, report.cancelled, report.ended
    );
    Ok(report)
}

fn generate_client(i: usize, spec: &PopulationSpec, rng: &mut PipelineRng) -> NewClient {
    let age_days = (rng.uniform(20.0, 75.0) * 365.25) as i64;
    let birth = spec.as_of - Duration::days(age_days);
    let income = if rng.chance(spec.zero_income_share) {
        0.0
    } else {
        (rng.normal(4_500.0, 2_000.0).max(900.0) * 100.0).round() / 100.0
    };
    let first = FIRST_NAMES[rng.next_index(FIRST_NAMES.len())];
    let last = LAST_NAMES[rng.next_index(LAST_NAMES.len())];
    let signup = spec.as_of - Duration::days(1_900 + rng.next_index(1_000) as i64);

    NewClient {
        client_id:      format!("CLI{:05}", i + 1),
        name:           format!("{first} {last}"),
        birth_date:     Some(birth.format(DATE_FMT).to_string()),
        gender:         Some(if rng.chance(0.5) { "F" } else { "M" }.to_string()),
        monthly_income: Some(income),
        education:      Some(EDUCATION_LEVELS[rng.next_index(EDUCATION_LEVELS.len())].to_string()),
        dependents:     Some(rng.next_index(4) as i64),
        signup_date:    Some(signup.format(DATE_FMT).to_string()),
    }
}

fn generate_contract(
    i: usize,
    client: &NewClient,
    spec: &PopulationSpec,
    rng: &mut PipelineRng,
) -> Draft {
    let (insurance_type, base_premium) = INSURANCE_TYPES[rng.next_index(INSURANCE_TYPES.len())];
    let premium = (base_premium * rng.uniform(0.6, 1.6) * 100.0).round() / 100.0;
    let start = spec.as_of - Duration::days(60 + rng.next_index(1_800) as i64);
    let term_end = start + Duration::days(365 * (1 + rng.next_index(3) as i64));

    let satisfaction = if rng.chance(0.05) {
        None
    } else {
        Some(rng.next_index(SATISFACTION_LEVELS.len()))
    };
    let auto_renewal = rng.chance(0.6);

    let income = client.monthly_income.unwrap_or(0.0);
    let burden = if income > 0.0 { premium / income } else { 0.25 };
    let risk = satisfaction.map_or(1.0, |s| (2 - s) as f64)
        + if auto_renewal { 0.0 } else { 1.0 }
        + burden * 8.0
        + rng.normal(0.0, 0.5);

    Draft {
        contract: NewContract {
            contract_id:     format!("CTR{:06}", i + 1),
            client_id:       Some(client.client_id.clone()),
            insurance_type:  Some(insurance_type.to_string()),
            start_date:      Some(start.format(DATE_FMT).to_string()),
            end_date:        Some(term_end.format(DATE_FMT).to_string()),
            monthly_premium: Some(premium),
            satisfaction:    satisfaction.map(|s| SATISFACTION_LEVELS[s].to_string()),
            sales_channel:   Some(SALES_CHANNELS[rng.next_index(SALES_CHANNELS.len())].to_string()),
            auto_renewal:    Some(auto_renewal),
            status:          ContractStatus::Active,
        },
        start,
        risk,
    }
}
