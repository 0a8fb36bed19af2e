use super::{ChurnStore, NewCancellation, NewClient, NewContract, CONTRACTS_VIEW};
use crate::{
    error::{PipelineError, PipelineResult},
    source::{ContractRow, ContractSource},
    types::{Cohort, ContractStatus},
};
use rusqlite::{params, types::Value};

/// Columns of the contracts view the extractor depends on.
pub const REQUIRED_VIEW_COLUMNS: [&str; 15] = [
    "contrato_id",
    "cliente_id",
    "tipo_seguro_nome",
    "premio_mensal",
    "data_inicio",
    "data_fim",
    "nivel_satisfacao",
    "renovacao_automatica",
    "canal_venda",
    "status_contrato",
    "cliente_genero",
    "cliente_nivel_educacional",
    "cliente_renda_mensal",
    "cliente_qtd_dependentes",
    "cliente_data_nascimento",
];

impl ChurnStore {
    // ── Source writes ──────────────────────────────────────────

    pub fn insert_client(&self, client: &NewClient) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO clientes (
                id_cliente, nome, data_nascimento, genero, renda_mensal,
                nivel_educacional, qtd_dependentes, data_cadastro
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            params![
                client.client_id,
                client.name,
                client.birth_date,
                client.gender,
                client.monthly_income,
                client.education,
                client.dependents,
                client.signup_date,
            ],
        )?;
        Ok(())
    }

    pub fn insert_contract(&self, contract: &NewContract) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO contratos (
                id_contrato, id_cliente, tipo_seguro, data_inicio, data_fim,
                valor_premio_mensal, satisfacao_ultima_avaliacao, canal_venda,
                renovado_automaticamente, status_contrato
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                contract.contract_id,
                contract.client_id,
                contract.insurance_type,
                contract.start_date,
                contract.end_date,
                contract.monthly_premium,
                contract.satisfaction,
                contract.sales_channel,
                contract.auto_renewal,
                contract.status.as_source_str(),
            ],
        )?;
        Ok(())
    }

    pub fn insert_cancellation(&self, cancellation: &NewCancellation) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO cancelamentos (
                id_contrato, data_cancelamento, motivo_cancelamento, canal_cancelamento
            ) VALUES (?1,?2,?3,?4)",
            params![
                cancellation.contract_id,
                cancellation.cancellation_date,
                cancellation.reason,
                cancellation.channel,
            ],
        )?;
        Ok(())
    }

    /// Bulk writes in one transaction.
    pub fn with_transaction<T>(
        &self,
        f: impl FnOnce(&ChurnStore) -> PipelineResult<T>,
    ) -> PipelineResult<T> {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    // ── Source reads ───────────────────────────────────────────

    /// Fail with `MissingColumn` unless the contracts view exposes every
    /// column the extractor needs.
    pub fn ensure_view_columns(&self) -> PipelineResult<()> {
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({CONTRACTS_VIEW})"))?;
        let present = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;

        if present.is_empty() {
            return Err(PipelineError::DataUnavailable(format!(
                "view {CONTRACTS_VIEW} does not exist"
            )));
        }
        for column in REQUIRED_VIEW_COLUMNS {
            if !present.iter().any(|p| p == column) {
                return Err(PipelineError::MissingColumn {
                    view:   CONTRACTS_VIEW.to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn contract_count(&self, cohort: Cohort) -> PipelineResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {CONTRACTS_VIEW}{}", cohort_filter(cohort));
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }
}

impl ContractSource for ChurnStore {
    fn describe(&self) -> String {
        format!("{CONTRACTS_VIEW}@{}", self.path.as_deref().unwrap_or(":memory:"))
    }

    fn contract_rows(&self, cohort: Cohort) -> PipelineResult<Vec<ContractRow>> {
        self.ensure_view_columns()?;

        let sql = format!(
            "SELECT {} FROM {CONTRACTS_VIEW}{} ORDER BY contrato_id ASC",
            REQUIRED_VIEW_COLUMNS.join(", "),
            cohort_filter(cohort),
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(ContractRow {
                contract_id:     row.get(0)?,
                client_id:       row.get(1)?,
                insurance_type:  row.get(2)?,
                monthly_premium: row.get(3)?,
                start_date:      row.get(4)?,
                end_date:        row.get(5)?,
                satisfaction:    value_as_text(row.get(6)?),
                auto_renewal:    value_as_flag(row.get(7)?),
                sales_channel:   row.get(8)?,
                status:          row.get(9)?,
                gender:          row.get(10)?,
                education:       row.get(11)?,
                monthly_income:  row.get(12)?,
                dependents:      row.get(13)?,
                birth_date:      row.get(14)?,
            })
        })?.collect::<Result<Vec<_>, _>>()?;

        log::debug!("store: read {} {cohort:?} row(s) from {CONTRACTS_VIEW}", rows.len());
        Ok(rows)
    }
}

fn cohort_filter(cohort: Cohort) -> String {
    match cohort {
        Cohort::All => String::new(),
        Cohort::Active => format!(
            " WHERE status_contrato = '{}'",
            ContractStatus::Active.as_source_str()
        ),
    }
}

fn value_as_text(value: Value) -> Option<String> {
    match value {
        Value::Null       => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f)    => Some(f.to_string()),
        Value::Text(s)    => Some(s),
        Value::Blob(_)    => None,
    }
}

fn value_as_flag(value: Value) -> Option<bool> {
    match value {
        Value::Integer(i) => Some(i != 0),
        Value::Real(f)    => Some(f != 0.0),
        Value::Text(s) => match s.trim().to_lowercase().as_str() {
            "1" | "true" | "t" | "sim" | "s" | "yes" | "y" => Some(true),
            "0" | "false" | "f" | "não" | "nao" | "n" | "no" => Some(false),
            _ => None,
        },
        Value::Null | Value::Blob(_) => None,
    }
}
