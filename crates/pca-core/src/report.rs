#![forbid(unsafe_code)]

//! Aggregations behind the dashboard, plan and report pages.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::model::{Demanda, DemandaStatus, UnidadeGestora};

/// Count and summed value of a group of demands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Bucket {
    pub count: usize,
    pub valor: f64,
}

impl Bucket {
    fn add(&mut self, valor: f64) {
        self.count += 1;
        self.valor += valor;
    }
}

fn valor(demanda: &Demanda) -> f64 {
    if demanda.valor_total.is_finite() {
        demanda.valor_total
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    pub total: f64,
    pub count: usize,
    /// Summed value per status name.
    pub by_status: BTreeMap<String, f64>,
}

#[must_use]
pub fn calculate_totals(demandas: &[Demanda]) -> Totals {
    demandas.iter().fold(Totals::default(), |mut acc, d| {
        acc.total += valor(d);
        acc.count += 1;
        *acc.by_status.entry(d.status.as_str().to_string()).or_default() += valor(d);
        acc
    })
}

/// Label for demands whose unit join is missing.
pub const SEM_UNIDADE: &str = "Sem Unidade";
/// Label for demands without a quarter.
pub const TRIMESTRE_NAO_DEFINIDO: &str = "Não definido";

/// Breakdowns shown on the reports page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Analytics {
    pub by_status: BTreeMap<String, Bucket>,
    pub by_unidade: BTreeMap<String, Bucket>,
    pub by_trimestre: BTreeMap<String, Bucket>,
    pub by_prioridade: BTreeMap<u8, Bucket>,
    pub total: f64,
}

impl Analytics {
    #[must_use]
    pub fn from_demandas(demandas: &[Demanda]) -> Self {
        let mut out = Self::default();
        for d in demandas {
            let v = valor(d);
            out.by_status
                .entry(d.status.as_str().to_string())
                .or_default()
                .add(v);
            out.by_unidade
                .entry(d.unidade_nome().unwrap_or(SEM_UNIDADE).to_string())
                .or_default()
                .add(v);
            out.by_trimestre
                .entry(
                    d.trimestre
                        .map_or(TRIMESTRE_NAO_DEFINIDO, |q| q.as_str())
                        .to_string(),
                )
                .or_default()
                .add(v);
            out.by_prioridade
                .entry(d.prioridade.level())
                .or_default()
                .add(v);
            out.total += v;
        }
        out
    }

    /// Value of one status, zero when absent.
    #[must_use]
    pub fn status_valor(&self, status: DemandaStatus) -> f64 {
        self.by_status.get(status.as_str()).map_or(0.0, |b| b.valor)
    }
}

/// Label for demands without a quarter on the plan page.
pub const SEM_DATA: &str = "Sem data";

/// Headline numbers of the annual plan page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlanSummary {
    pub total: f64,
    pub aprovado: f64,
    pub pendente: f64,
    pub by_quarter: BTreeMap<String, f64>,
    pub total_demandas: usize,
    pub demandas_aprovadas: usize,
    pub unidades_com_demanda: usize,
    pub unidades_pendentes: usize,
}

impl PlanSummary {
    #[must_use]
    pub fn compute(demandas: &[Demanda], unidades: &[UnidadeGestora]) -> Self {
        let mut out = Self {
            total_demandas: demandas.len(),
            ..Self::default()
        };
        let mut with_demand = BTreeSet::new();
        for d in demandas {
            let v = valor(d);
            out.total += v;
            match d.status {
                DemandaStatus::Aprovada => {
                    out.aprovado += v;
                    out.demandas_aprovadas += 1;
                }
                DemandaStatus::Pendente => out.pendente += v,
                DemandaStatus::EmAnalise | DemandaStatus::Rejeitada => {}
            }
            *out.by_quarter
                .entry(d.trimestre.map_or(SEM_DATA, |q| q.as_str()).to_string())
                .or_default() += v;
            with_demand.insert(d.unidade_id.as_str());
        }
        out.unidades_com_demanda = with_demand.len();
        out.unidades_pendentes = unidades.len().saturating_sub(with_demand.len());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Prioridade, Quarter, UnidadeRef};
    use pretty_assertions::assert_eq;

    fn demanda(id: &str, unidade: Option<&str>, status: DemandaStatus, valor: f64) -> Demanda {
        Demanda {
            id: id.into(),
            unidade_id: unidade.unwrap_or("orfa").into(),
            unidade: unidade.map(|u| UnidadeRef {
                id: u.into(),
                nome: format!("Secretaria {u}"),
                sigla: u.to_uppercase(),
            }),
            item: "item".into(),
            descricao: String::new(),
            justificativa: String::new(),
            quantidade: 1.0,
            valor_unitario: valor,
            valor_total: valor,
            data_prevista: None,
            trimestre: None,
            status,
            prioridade: Prioridade::default(),
            created_at: None,
            updated_at: None,
        }
    }

    fn unidade(id: &str) -> UnidadeGestora {
        UnidadeGestora {
            id: id.into(),
            nome: id.into(),
            sigla: id.into(),
            responsavel: String::new(),
            email: String::new(),
            created_at: None,
        }
    }

    #[test]
    fn totals_group_by_status() {
        let ds = [
            demanda("1", Some("a"), DemandaStatus::Aprovada, 100.0),
            demanda("2", Some("a"), DemandaStatus::Pendente, 50.0),
            demanda("3", Some("b"), DemandaStatus::Aprovada, 25.0),
        ];
        let totals = calculate_totals(&ds);
        assert_eq!(totals.total, 175.0);
        assert_eq!(totals.count, 3);
        assert_eq!(totals.by_status["aprovada"], 125.0);
        assert_eq!(totals.by_status["pendente"], 50.0);
    }

    #[test]
    fn analytics_uses_fallback_labels() {
        let mut q2 = demanda("1", Some("a"), DemandaStatus::Aprovada, 10.0);
        q2.trimestre = Some(Quarter::Q2);
        q2.prioridade = Prioridade::CRITICA;
        let orphan = demanda("2", None, DemandaStatus::Rejeitada, 5.0);
        let a = Analytics::from_demandas(&[q2, orphan]);

        assert_eq!(a.total, 15.0);
        assert_eq!(a.by_unidade[SEM_UNIDADE], Bucket { count: 1, valor: 5.0 });
        assert_eq!(a.by_unidade["Secretaria a"].count, 1);
        assert_eq!(a.by_trimestre["Q2"].valor, 10.0);
        assert_eq!(a.by_trimestre[TRIMESTRE_NAO_DEFINIDO].valor, 5.0);
        assert_eq!(a.by_prioridade[&1].count, 1);
        assert_eq!(a.by_prioridade[&3].count, 1);
        assert_eq!(a.status_valor(DemandaStatus::Aprovada), 10.0);
        assert_eq!(a.status_valor(DemandaStatus::Pendente), 0.0);
    }

    #[test]
    fn plan_summary_counts_units() {
        let ds = [
            demanda("1", Some("a"), DemandaStatus::Aprovada, 100.0),
            demanda("2", Some("a"), DemandaStatus::Pendente, 40.0),
            demanda("3", Some("b"), DemandaStatus::EmAnalise, 1.0),
        ];
        let units = [unidade("a"), unidade("b"), unidade("c"), unidade("d")];
        let s = PlanSummary::compute(&ds, &units);
        assert_eq!(s.total, 141.0);
        assert_eq!(s.aprovado, 100.0);
        assert_eq!(s.pendente, 40.0);
        assert_eq!(s.by_quarter[SEM_DATA], 141.0);
        assert_eq!(s.total_demandas, 3);
        assert_eq!(s.demandas_aprovadas, 1);
        assert_eq!(s.unidades_com_demanda, 2);
        assert_eq!(s.unidades_pendentes, 2);
    }
}
