use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use indexmap::IndexSet;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};

use crate::config::MatchingConfig;
use crate::db;
use crate::error::{Error, Result};
use crate::models::{
    AutopickReport, LineDetail, Offer, OfferSnapshot, OfferTotals, OfferType, OfferView,
    ProjectDetail, TenderLine,
};
use crate::service::numeric::packs_needed;
use crate::service::search_text::{normalize_name, NormalizerConfig, MAX_KEY_WORDS};

/// Offer state machine over tender lines. Every transition runs in one
/// transaction so a line always has at most one active (selected or final)
/// offer and its pointer never dangles.
pub struct OfferLifecycle {
    pool: PgPool,
    normalizer: NormalizerConfig,
    cfg: MatchingConfig,
}

impl OfferLifecycle {
    pub fn new(pool: PgPool, normalizer: NormalizerConfig, cfg: MatchingConfig) -> Self {
        Self {
            pool,
            normalizer,
            cfg,
        }
    }

    /// Key used to rebuild a line's alternatives. Weak requirements get no
    /// key and therefore no alternatives.
    fn line_key(&self, line: &TenderLine) -> Option<String> {
        self.normalizer
            .search_key(&line.name_input, self.cfg.min_search_tokens, MAX_KEY_WORDS)
    }

    /// Key used to score a manually picked item. Falls back to the plain
    /// normalized requirement so a manual pick always gets a score.
    fn scoring_key(&self, line: &TenderLine) -> String {
        self.normalizer
            .search_key(&line.name_input, 1, MAX_KEY_WORDS)
            .unwrap_or_else(|| {
                let normalized = normalize_name(&line.name_input);
                if normalized.is_empty() {
                    line.name_input.clone()
                } else {
                    normalized
                }
            })
    }

    /// Pick a catalog item as the selected offer of a line, snapshotting it
    /// and rebuilding the line's alternatives around the pick.
    pub async fn select(&self, line_id: i64, catalog_item_id: i64) -> Result<Offer> {
        let mut tx = self.pool.begin().await?;

        let line = db::tender::get_line(&mut *tx, line_id)
            .await?
            .ok_or(Error::NotFound("tender line"))?;
        let item = db::catalog::get_item_with_supplier(&mut *tx, catalog_item_id)
            .await?
            .ok_or(Error::NotFound("catalog item"))?;

        let key = self.scoring_key(&line);
        let score = db::offers::similarity_score(&mut *tx, &item.match_text, &key).await?;

        db::offers::demote_active(&mut *tx, line_id).await?;
        let snapshot = OfferSnapshot::from_item(&item, Some(score));
        let offer_id =
            db::offers::upsert_offer(&mut *tx, line_id, OfferType::Selected.as_str(), &snapshot)
                .await?;
        self.rebuild_alternatives_tx(&mut tx, &line, Some(catalog_item_id))
            .await?;
        db::tender::set_selected_offer(&mut *tx, line_id, Some(offer_id)).await?;

        let offer = db::offers::get_offer(&mut *tx, offer_id)
            .await?
            .ok_or(Error::NotFound("offer"))?;
        tx.commit().await?;

        info!(line_id, catalog_item_id, offer_id, score, "offer selected");
        Ok(offer)
    }

    /// Refresh a line's alternatives from the live catalog without touching
    /// its active offer.
    pub async fn rebuild_alternatives(&self, line_id: i64) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        let line = db::tender::get_line(&mut *tx, line_id)
            .await?
            .ok_or(Error::NotFound("tender line"))?;
        let exclude = match line.selected_offer_id {
            Some(offer_id) => db::offers::get_offer(&mut *tx, offer_id)
                .await?
                .map(|o| o.catalog_item_id),
            None => None,
        };
        let kept = self.rebuild_alternatives_tx(&mut tx, &line, exclude).await?;
        tx.commit().await?;
        Ok(kept)
    }

    /// Rebuild the alternative offers of a line: the best candidates of each
    /// supplier in the project scope, snapshotted and upserted, with stale
    /// alternatives deleted. The active offer's item is excluded so the
    /// rebuild never flips its state.
    async fn rebuild_alternatives_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        line: &TenderLine,
        exclude_item: Option<i64>,
    ) -> Result<usize> {
        let mut kept: IndexSet<i64> = IndexSet::new();

        if let Some(key) = self.line_key(line) {
            let mut supplier_ids =
                db::tender::project_supplier_ids(&mut **tx, line.project_id).await?;
            if supplier_ids.is_empty() {
                supplier_ids = db::tender::all_supplier_ids(&mut **tx).await?;
            }

            for supplier_id in supplier_ids {
                let candidates = db::offers::top_supplier_candidates(
                    &mut **tx,
                    &key,
                    supplier_id,
                    self.cfg.similarity_floor,
                    line.category_code.as_deref(),
                    self.cfg.per_supplier_limit,
                )
                .await?;
                for candidate in &candidates {
                    if Some(candidate.catalog_item_id) == exclude_item {
                        continue;
                    }
                    let snapshot = OfferSnapshot::from_candidate(candidate);
                    let offer_id = db::offers::upsert_offer(
                        &mut **tx,
                        line.id,
                        OfferType::Alternative.as_str(),
                        &snapshot,
                    )
                    .await?;
                    kept.insert(offer_id);
                }
            }
        } else {
            debug!(line_id = line.id, "requirement too weak, clearing alternatives");
        }

        let keep_ids: Vec<i64> = kept.iter().copied().collect();
        let removed = db::offers::delete_stale_alternatives(&mut **tx, line.id, &keep_ids).await?;
        debug!(
            line_id = line.id,
            kept = keep_ids.len(),
            removed,
            "alternatives rebuilt"
        );
        Ok(keep_ids.len())
    }

    /// Demote a line's active offer back to an alternative and clear the
    /// pointer. The snapshot stays around as an alternative.
    pub async fn clear(&self, line_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if db::tender::get_line(&mut *tx, line_id).await?.is_none() {
            return Err(Error::NotFound("tender line"));
        }
        db::offers::demote_active(&mut *tx, line_id).await?;
        db::tender::set_selected_offer(&mut *tx, line_id, None).await?;

        tx.commit().await?;
        info!(line_id, "offer selection cleared");
        Ok(())
    }

    /// Mark an offer of a line as the final award. Any previously active
    /// offer is demoted first.
    pub async fn finalize(&self, line_id: i64, offer_id: i64) -> Result<Offer> {
        let mut tx = self.pool.begin().await?;

        if db::tender::get_line(&mut *tx, line_id).await?.is_none() {
            return Err(Error::NotFound("tender line"));
        }
        let offer = db::offers::get_offer(&mut *tx, offer_id)
            .await?
            .filter(|o| o.tender_line_id == line_id)
            .ok_or(Error::NotFound("offer"))?;

        db::offers::demote_active(&mut *tx, line_id).await?;
        db::offers::set_offer_type(&mut *tx, offer_id, OfferType::Final.as_str()).await?;
        db::tender::set_selected_offer(&mut *tx, line_id, Some(offer_id)).await?;

        tx.commit().await?;
        info!(line_id, offer_id, "offer finalized");

        Ok(Offer {
            offer_type: OfferType::Final.as_str().to_string(),
            ..offer
        })
    }

    /// Select the best-scoring candidate for every line of a project that
    /// has no active offer yet.
    pub async fn autopick(&self, project_id: i64) -> Result<AutopickReport> {
        if db::tender::get_project(&self.pool, project_id)
            .await?
            .is_none()
        {
            return Err(Error::NotFound("tender project"));
        }

        // an empty scope means every supplier participates
        let scope = db::tender::project_supplier_ids(&self.pool, project_id).await?;

        let lines = db::tender::list_lines(&self.pool, project_id).await?;
        let mut report = AutopickReport {
            lines: lines.len(),
            selected: 0,
        };

        for line in &lines {
            if line.selected_offer_id.is_some() {
                continue;
            }
            let Some(key) = self.line_key(line) else {
                continue;
            };
            if let Some(candidate) = self.best_candidate(&key, line, &scope).await? {
                self.select(line.id, candidate).await?;
                report.selected += 1;
            }
        }

        info!(
            project_id,
            lines = report.lines,
            selected = report.selected,
            "autopick finished"
        );
        Ok(report)
    }

    /// Best-scoring catalog item for a requirement, honoring the supplier
    /// scope. Ties break toward the cheaper per-unit price.
    async fn best_candidate(
        &self,
        key: &str,
        line: &TenderLine,
        scope: &[i64],
    ) -> Result<Option<i64>> {
        if scope.is_empty() {
            let best = db::offers::find_candidates(
                &self.pool,
                key,
                self.cfg.similarity_floor,
                line.category_code.as_deref(),
                None,
                1,
            )
            .await?;
            return Ok(best.first().map(|c| c.catalog_item_id));
        }

        let mut best: Option<crate::models::CandidateMatch> = None;
        for &supplier_id in scope {
            let candidates = db::offers::top_supplier_candidates(
                &self.pool,
                key,
                supplier_id,
                self.cfg.similarity_floor,
                line.category_code.as_deref(),
                1,
            )
            .await?;
            for candidate in candidates {
                let better = match &best {
                    None => true,
                    Some(current) => {
                        candidate.score > current.score
                            || (candidate.score == current.score
                                && cheaper(
                                    candidate.price_per_unit.as_ref(),
                                    current.price_per_unit.as_ref(),
                                ))
                    }
                };
                if better {
                    best = Some(candidate);
                }
            }
        }
        Ok(best.map(|c| c.catalog_item_id))
    }

    /// One line with its offers in presentation order, totals included.
    pub async fn line_offers(&self, line_id: i64) -> Result<LineDetail> {
        let line = db::tender::get_line(&self.pool, line_id)
            .await?
            .ok_or(Error::NotFound("tender line"))?;
        let offers = db::offers::list_offers(&self.pool, line_id).await?;
        let offers = offers
            .into_iter()
            .map(|o| offer_view(o, line.qty.as_ref()))
            .collect();
        Ok(LineDetail { line, offers })
    }

    /// Whole project view: supplier scope, lines and their offers.
    pub async fn project_detail(&self, project_id: i64) -> Result<ProjectDetail> {
        let project = db::tender::get_project(&self.pool, project_id)
            .await?
            .ok_or(Error::NotFound("tender project"))?;

        let mut suppliers = db::tender::project_suppliers(&self.pool, project_id).await?;
        if suppliers.is_empty() {
            suppliers = db::catalog::list_suppliers(&self.pool).await?;
        }

        let lines = db::tender::list_lines(&self.pool, project_id).await?;
        let line_ids: Vec<i64> = lines.iter().map(|l| l.id).collect();
        let mut offers = db::offers::list_offers_for_lines(&self.pool, &line_ids).await?;

        let details = lines
            .into_iter()
            .map(|line| {
                let (mine, rest): (Vec<Offer>, Vec<Offer>) = offers
                    .drain(..)
                    .partition(|o| o.tender_line_id == line.id);
                offers = rest;
                let views = mine
                    .into_iter()
                    .map(|o| offer_view(o, line.qty.as_ref()))
                    .collect();
                LineDetail {
                    line,
                    offers: views,
                }
            })
            .collect();

        Ok(ProjectDetail {
            project,
            suppliers,
            lines: details,
        })
    }
}

/// None per-unit prices lose ties.
fn cheaper(candidate: Option<&BigDecimal>, current: Option<&BigDecimal>) -> bool {
    match (candidate, current) {
        (Some(a), Some(b)) => a < b,
        (Some(_), None) => true,
        _ => false,
    }
}

fn offer_view(offer: Offer, tender_qty: Option<&BigDecimal>) -> OfferView {
    let totals = offer_totals(
        Some(&offer.price),
        offer.price_per_unit.as_ref(),
        offer.base_qty.as_ref(),
        tender_qty,
    );
    OfferView {
        offer,
        tender_qty: tender_qty.cloned(),
        total_price: totals.total_price,
        packs_needed: totals.packs_needed,
    }
}

/// Money math for an offer against a requested quantity. Per-base-unit
/// pricing wins when available; otherwise the buyer pays for whole packages
/// and the total is packs times package price.
pub fn offer_totals(
    price: Option<&BigDecimal>,
    price_per_unit: Option<&BigDecimal>,
    base_qty: Option<&BigDecimal>,
    requested: Option<&BigDecimal>,
) -> OfferTotals {
    let Some(requested) = requested else {
        return OfferTotals::default();
    };

    let packs = base_qty
        .filter(|q| *q > &BigDecimal::zero())
        .and_then(|q| packs_needed(requested, q));

    let total_price = match price_per_unit {
        Some(ppu) => Some(ppu * requested),
        None => match (&packs, price) {
            (Some(packs), Some(price)) => Some(packs * price),
            _ => None,
        },
    };
    let packs_needed = packs.as_ref().and_then(|p| p.to_u64());

    OfferTotals {
        total_price,
        packs_needed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn per_unit_price_drives_the_total() {
        let totals = offer_totals(
            Some(&dec("250")),
            Some(&dec("500.0000")),
            Some(&dec("0.5")),
            Some(&dec("10")),
        );
        assert_eq!(totals.total_price, Some(dec("5000.0000")));
        // 10 kg in 0.5 kg packs
        assert_eq!(totals.packs_needed, Some(20));
    }

    #[test]
    fn pack_price_fallback_rounds_packs_up() {
        let totals = offer_totals(Some(&dec("800")), None, Some(&dec("3")), Some(&dec("10")));
        assert_eq!(totals.packs_needed, Some(4));
        assert_eq!(totals.total_price, Some(dec("3200")));
    }

    /// In-memory mirror of one line's offer rows, applying the exact
    /// statement order the lifecycle transactions run: demote active rows,
    /// upsert keyed by (line, catalog item), delete stale alternatives,
    /// move the pointer.
    #[derive(Default)]
    struct LineState {
        rows: Vec<(i64, i64, OfferType)>, // (offer id, catalog item id, state)
        pointer: Option<i64>,
        next_id: i64,
    }

    impl LineState {
        fn demote_active(&mut self) {
            for row in &mut self.rows {
                if matches!(row.2, OfferType::Selected | OfferType::Final) {
                    row.2 = OfferType::Alternative;
                }
            }
        }

        fn upsert(&mut self, item_id: i64, state: OfferType) -> i64 {
            if let Some(row) = self.rows.iter_mut().find(|r| r.1 == item_id) {
                row.2 = state;
                return row.0;
            }
            self.next_id += 1;
            self.rows.push((self.next_id, item_id, state));
            self.next_id
        }

        fn delete_stale_alternatives(&mut self, keep: &[i64]) {
            self.rows
                .retain(|r| r.2 != OfferType::Alternative || keep.contains(&r.0));
        }

        fn select(&mut self, item_id: i64, rebuilt_items: &[i64]) {
            self.demote_active();
            let id = self.upsert(item_id, OfferType::Selected);
            let kept: Vec<i64> = rebuilt_items
                .iter()
                .filter(|i| **i != item_id)
                .map(|i| self.upsert(*i, OfferType::Alternative))
                .collect();
            self.delete_stale_alternatives(&kept);
            self.pointer = Some(id);
        }

        fn clear(&mut self) {
            self.demote_active();
            self.pointer = None;
        }

        fn finalize(&mut self, offer_id: i64) {
            self.demote_active();
            if let Some(row) = self.rows.iter_mut().find(|r| r.0 == offer_id) {
                row.2 = OfferType::Final;
            }
            self.pointer = Some(offer_id);
        }

        fn count(&self, state: OfferType) -> usize {
            self.rows.iter().filter(|r| r.2 == state).count()
        }
    }

    #[test]
    fn reselecting_never_duplicates_an_offer_row() {
        let mut line = LineState::default();
        line.select(1, &[2, 3]);
        line.select(2, &[1, 3]);
        line.select(1, &[2, 3]);

        // one row per catalog item, however often it flips state
        let mut items: Vec<i64> = line.rows.iter().map(|r| r.1).collect();
        items.sort_unstable();
        items.dedup();
        assert_eq!(items.len(), line.rows.len());

        assert_eq!(line.count(OfferType::Selected), 1);
        let selected = line
            .rows
            .iter()
            .find(|r| r.2 == OfferType::Selected)
            .unwrap();
        assert_eq!(selected.1, 1);
        assert_eq!(line.pointer, Some(selected.0));
    }

    #[test]
    fn clear_demotes_a_final_offer_and_nulls_the_pointer() {
        let mut line = LineState::default();
        line.select(1, &[2]);
        let picked = line.pointer.unwrap();
        line.finalize(picked);
        assert_eq!(line.count(OfferType::Final), 1);

        line.clear();
        assert_eq!(line.pointer, None);
        assert_eq!(line.count(OfferType::Selected), 0);
        assert_eq!(line.count(OfferType::Final), 0);
        // the snapshot survives as an alternative
        assert!(line.rows.iter().any(|r| r.1 == 1));
    }

    #[test]
    fn finalizing_demotes_the_previous_final() {
        let mut line = LineState::default();
        line.select(1, &[2]);
        line.finalize(line.pointer.unwrap());

        let other = line
            .rows
            .iter()
            .find(|r| r.2 == OfferType::Alternative)
            .unwrap()
            .0;
        line.finalize(other);

        assert_eq!(line.count(OfferType::Final), 1);
        assert_eq!(line.pointer, Some(other));
    }

    #[test]
    fn missing_inputs_leave_totals_empty() {
        assert_eq!(
            offer_totals(Some(&dec("800")), None, None, Some(&dec("10"))),
            OfferTotals::default()
        );
        assert_eq!(
            offer_totals(Some(&dec("800")), Some(&dec("80")), Some(&dec("1")), None),
            OfferTotals::default()
        );
        // zero pack size never divides
        assert_eq!(
            offer_totals(Some(&dec("800")), None, Some(&dec("0")), Some(&dec("10"))),
            OfferTotals::default()
        );
    }
}
