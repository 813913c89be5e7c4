use std::{
    collections::{BTreeSet, HashMap},
    str::FromStr,
};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, QueryFilter, prelude::*};

use crate::{Currency, EngineError, Rate, ResultEngine, exchange_rates, util::model_currency};

use super::Engine;

/// Conversion rates towards one target currency, preloaded for a set of
/// `(date, from_currency)` keys.
pub(super) struct RateBook {
    target: Currency,
    rates: HashMap<(NaiveDate, Currency), Rate>,
}

impl RateBook {
    pub(super) async fn load<C, I>(db: &C, target: Currency, keys: I) -> ResultEngine<Self>
    where
        C: ConnectionTrait,
        I: IntoIterator<Item = (NaiveDate, Currency)>,
    {
        let keys: BTreeSet<(NaiveDate, Currency)> = keys.into_iter().collect();
        let mut rates = HashMap::with_capacity(keys.len());

        // Keys sort by date first.
        let (Some(&(min_date, _)), Some(&(max_date, _))) = (keys.first(), keys.last()) else {
            return Ok(Self { target, rates });
        };
        let currencies: BTreeSet<&str> = keys.iter().map(|(_, from)| from.code()).collect();

        let models = exchange_rates::Entity::find()
            .filter(exchange_rates::Column::ToCurrency.eq(target.code()))
            .filter(exchange_rates::Column::FromCurrency.is_in(currencies))
            .filter(exchange_rates::Column::Date.between(min_date, max_date))
            .all(db)
            .await?;

        for model in models {
            let from = model_currency(model.from_currency.as_str())?;
            if !keys.contains(&(model.date, from)) {
                continue;
            }
            let value = parse_rate(&model.rate)?;
            rates.insert(
                (model.date, from),
                Rate::stored(model.date, from, target, value),
            );
        }

        for (date, from) in keys {
            rates.entry((date, from)).or_insert_with(|| {
                let rate = Rate::fallback(date, from, target);
                if rate.is_configuration_gap() {
                    tracing::warn!(
                        %date,
                        from = from.code(),
                        to = target.code(),
                        "missing exchange rate, converting at 1:1"
                    );
                }
                rate
            });
        }

        Ok(Self { target, rates })
    }

    pub(super) fn rate(&self, date: NaiveDate, from: Currency) -> Rate {
        self.rates
            .get(&(date, from))
            .copied()
            .unwrap_or_else(|| Rate::fallback(date, from, self.target))
    }
}

fn parse_rate(raw: &str) -> ResultEngine<Decimal> {
    Decimal::from_str(raw.trim())
        .map_err(|_| EngineError::InvalidAmount(format!("invalid exchange rate: {raw}")))
}

impl Engine {
    /// Conversion rate for `(date, from → to)`.
    ///
    /// When no row exists the rate defaults to 1; the returned [`Rate`] tells
    /// a missing row ([`RateSource::Missing`](crate::RateSource::Missing))
    /// apart from a stored 1:1 rate.
    pub async fn rate_for(
        &self,
        date: NaiveDate,
        from: Currency,
        to: Currency,
    ) -> ResultEngine<Rate> {
        let book = RateBook::load(&self.database, to, [(date, from)]).await?;
        Ok(book.rate(date, from))
    }
}
