//! Portfolio cash and holdings state.
//!
//! [`PortfolioAccount`] is the in-memory image of one portfolio row plus its
//! holdings. Ledger mutations are applied to it while the store holds the
//! portfolio lock; the store then persists [`holding_changes`].

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use super::error::FolioError;
use super::money::{round_cents, PositiveAmount, ShareCount, Symbol};

pub type UserId = i64;
pub type PortfolioId = i64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub portfolio_id: PortfolioId,
    pub user_id: UserId,
    pub name: String,
    pub cash_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub symbol: String,
    pub num_shares: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioAccount {
    pub portfolio: Portfolio,
    pub holdings: BTreeMap<String, Decimal>,
}

/// Persisted effect of a mutation on one holding row.
#[derive(Debug, Clone, PartialEq)]
pub enum HoldingChange {
    Upsert { symbol: String, num_shares: Decimal },
    Remove { symbol: String },
}

impl PortfolioAccount {
    pub fn new(portfolio: Portfolio, holdings: Vec<Holding>) -> Self {
        let holdings = holdings
            .into_iter()
            .filter(|h| h.num_shares > Decimal::ZERO)
            .map(|h| (h.symbol, h.num_shares))
            .collect();
        Self {
            portfolio,
            holdings,
        }
    }

    pub fn cash(&self) -> Decimal {
        self.portfolio.cash_balance
    }

    pub fn shares_of(&self, symbol: &str) -> Decimal {
        self.holdings.get(symbol).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn ensure_owner(&self, user_id: UserId) -> Result<(), FolioError> {
        if self.portfolio.user_id != user_id {
            return Err(FolioError::Unauthorized {
                user_id,
                portfolio_id: self.portfolio.portfolio_id,
            });
        }
        Ok(())
    }

    pub fn deposit(&mut self, amount: PositiveAmount) -> Decimal {
        self.portfolio.cash_balance += amount.value();
        self.portfolio.cash_balance
    }

    pub fn withdraw(&mut self, amount: PositiveAmount) -> Result<Decimal, FolioError> {
        let amount = amount.value();
        if self.portfolio.cash_balance < amount {
            return Err(FolioError::InsufficientFunds {
                required: amount,
                available: self.portfolio.cash_balance,
            });
        }
        self.portfolio.cash_balance -= amount;
        Ok(self.portfolio.cash_balance)
    }

    /// Debit `price * shares` (rounded to cents) and add the shares.
    /// Returns the debited total.
    pub fn buy(
        &mut self,
        symbol: &Symbol,
        shares: ShareCount,
        price: Decimal,
    ) -> Result<Decimal, FolioError> {
        let total = round_cents(price * shares.value());
        if self.portfolio.cash_balance < total {
            return Err(FolioError::InsufficientFunds {
                required: total,
                available: self.portfolio.cash_balance,
            });
        }
        self.portfolio.cash_balance -= total;
        *self
            .holdings
            .entry(symbol.as_str().to_string())
            .or_insert(Decimal::ZERO) += shares.value();
        Ok(total)
    }

    /// Check the holding covers `shares` without touching any state.
    pub fn ensure_can_sell(&self, symbol: &Symbol, shares: ShareCount) -> Result<(), FolioError> {
        let held = self.shares_of(symbol.as_str());
        if held < shares.value() {
            return Err(FolioError::InsufficientShares {
                symbol: symbol.to_string(),
                requested: shares.value(),
                held,
            });
        }
        Ok(())
    }

    /// Remove the shares and credit `price * shares` (rounded to cents).
    /// Returns the credited proceeds.
    pub fn sell(
        &mut self,
        symbol: &Symbol,
        shares: ShareCount,
        price: Decimal,
    ) -> Result<Decimal, FolioError> {
        self.ensure_can_sell(symbol, shares)?;
        let remaining = self.shares_of(symbol.as_str()) - shares.value();
        if remaining <= Decimal::ZERO {
            self.holdings.remove(symbol.as_str());
        } else {
            self.holdings.insert(symbol.as_str().to_string(), remaining);
        }
        let proceeds = round_cents(price * shares.value());
        self.portfolio.cash_balance += proceeds;
        Ok(proceeds)
    }

    pub fn holdings_list(&self) -> Vec<Holding> {
        self.holdings
            .iter()
            .map(|(symbol, shares)| Holding {
                symbol: symbol.clone(),
                num_shares: *shares,
            })
            .collect()
    }
}

/// Row-level writes needed to turn `before` into `after`.
pub fn holding_changes(before: &PortfolioAccount, after: &PortfolioAccount) -> Vec<HoldingChange> {
    let mut changes = Vec::new();
    for (symbol, shares) in &after.holdings {
        if before.holdings.get(symbol) != Some(shares) {
            if *shares > Decimal::ZERO {
                changes.push(HoldingChange::Upsert {
                    symbol: symbol.clone(),
                    num_shares: *shares,
                });
            } else {
                changes.push(HoldingChange::Remove {
                    symbol: symbol.clone(),
                });
            }
        }
    }
    for symbol in before.holdings.keys() {
        if !after.holdings.contains_key(symbol) {
            changes.push(HoldingChange::Remove {
                symbol: symbol.clone(),
            });
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: i64, scale: u32) -> Decimal {
        Decimal::new(value, scale)
    }

    fn account(cash: Decimal) -> PortfolioAccount {
        PortfolioAccount::new(
            Portfolio {
                portfolio_id: 1,
                user_id: 7,
                name: "Main".into(),
                cash_balance: cash,
            },
            Vec::new(),
        )
    }

    fn abc() -> Symbol {
        Symbol::parse("ABC").unwrap()
    }

    #[test]
    fn new_drops_empty_holdings() {
        let acc = PortfolioAccount::new(
            account(Decimal::ZERO).portfolio,
            vec![
                Holding {
                    symbol: "ABC".into(),
                    num_shares: dec(10, 0),
                },
                Holding {
                    symbol: "XYZ".into(),
                    num_shares: Decimal::ZERO,
                },
            ],
        );
        assert_eq!(acc.holdings.len(), 1);
        assert_eq!(acc.shares_of("ABC"), dec(10, 0));
    }

    #[test]
    fn ensure_owner_rejects_other_user() {
        let acc = account(Decimal::ZERO);
        assert!(acc.ensure_owner(7).is_ok());
        assert!(matches!(
            acc.ensure_owner(8),
            Err(FolioError::Unauthorized {
                user_id: 8,
                portfolio_id: 1
            })
        ));
    }

    #[test]
    fn deposit_adds_to_balance() {
        let mut acc = account(dec(1000, 2));
        let balance = acc.deposit(PositiveAmount::new(dec(2550, 2)).unwrap());
        assert_eq!(balance, dec(3550, 2));
    }

    #[test]
    fn withdraw_exact_balance_succeeds() {
        let mut acc = account(dec(100, 0));
        let balance = acc
            .withdraw(PositiveAmount::new(dec(100, 0)).unwrap())
            .unwrap();
        assert_eq!(balance, Decimal::ZERO);
    }

    #[test]
    fn withdraw_more_than_balance_fails_without_mutation() {
        let mut acc = account(dec(100, 0));
        let err = acc
            .withdraw(PositiveAmount::new(dec(150, 0)).unwrap())
            .unwrap_err();
        assert!(matches!(err, FolioError::InsufficientFunds { .. }));
        assert_eq!(acc.cash(), dec(100, 0));
    }

    #[test]
    fn buy_then_sell_scenario() {
        let mut acc = account(dec(100000, 2));
        let cost = acc
            .buy(&abc(), ShareCount::new(dec(10, 0)).unwrap(), dec(50, 0))
            .unwrap();
        assert_eq!(cost, dec(500, 0));
        assert_eq!(acc.cash(), dec(500, 0));
        assert_eq!(acc.shares_of("ABC"), dec(10, 0));

        let proceeds = acc
            .sell(&abc(), ShareCount::new(dec(4, 0)).unwrap(), dec(60, 0))
            .unwrap();
        assert_eq!(proceeds, dec(240, 0));
        assert_eq!(acc.cash(), dec(740, 0));
        assert_eq!(acc.shares_of("ABC"), dec(6, 0));
    }

    #[test]
    fn buy_insufficient_funds_leaves_state() {
        let mut acc = account(dec(100, 0));
        let err = acc
            .buy(&abc(), ShareCount::new(dec(3, 0)).unwrap(), dec(50, 0))
            .unwrap_err();
        assert!(matches!(err, FolioError::InsufficientFunds { .. }));
        assert_eq!(acc.cash(), dec(100, 0));
        assert!(acc.holdings.is_empty());
    }

    #[test]
    fn buy_exact_cash_succeeds() {
        let mut acc = account(dec(150, 0));
        acc.buy(&abc(), ShareCount::new(dec(3, 0)).unwrap(), dec(50, 0))
            .unwrap();
        assert_eq!(acc.cash(), Decimal::ZERO);
    }

    #[test]
    fn sell_all_removes_holding() {
        let mut acc = account(dec(1000, 0));
        acc.buy(&abc(), ShareCount::new(dec(5, 0)).unwrap(), dec(10, 0))
            .unwrap();
        acc.sell(&abc(), ShareCount::new(dec(5, 0)).unwrap(), dec(10, 0))
            .unwrap();
        assert!(!acc.holdings.contains_key("ABC"));
        assert_eq!(acc.cash(), dec(1000, 0));
    }

    #[test]
    fn sell_more_than_held_fails() {
        let mut acc = account(dec(1000, 0));
        acc.buy(&abc(), ShareCount::new(dec(2, 0)).unwrap(), dec(10, 0))
            .unwrap();
        let err = acc
            .sell(&abc(), ShareCount::new(dec(3, 0)).unwrap(), dec(10, 0))
            .unwrap_err();
        match err {
            FolioError::InsufficientShares {
                requested, held, ..
            } => {
                assert_eq!(requested, dec(3, 0));
                assert_eq!(held, dec(2, 0));
            }
            other => panic!("expected InsufficientShares, got {other}"),
        }
        assert_eq!(acc.shares_of("ABC"), dec(2, 0));
    }

    #[test]
    fn sell_without_holding_fails() {
        let mut acc = account(dec(1000, 0));
        assert!(matches!(
            acc.sell(&abc(), ShareCount::new(dec(1, 0)).unwrap(), dec(10, 0)),
            Err(FolioError::InsufficientShares { .. })
        ));
    }

    #[test]
    fn fractional_cost_rounds_to_cents() {
        let mut acc = account(dec(100, 0));
        let cost = acc
            .buy(&abc(), ShareCount::new(dec(3, 0)).unwrap(), dec(3333, 4))
            .unwrap();
        // 3 * 0.3333 = 0.9999 -> 1.00
        assert_eq!(cost, dec(100, 2));
        assert_eq!(acc.cash(), dec(9900, 2));
    }

    #[test]
    fn holding_changes_upsert_and_remove() {
        let mut before = account(dec(1000, 0));
        before
            .buy(&abc(), ShareCount::new(dec(5, 0)).unwrap(), dec(1, 0))
            .unwrap();
        let mut after = before.clone();
        after
            .sell(&abc(), ShareCount::new(dec(5, 0)).unwrap(), dec(1, 0))
            .unwrap();
        after
            .buy(
                &Symbol::parse("XYZ").unwrap(),
                ShareCount::new(dec(2, 0)).unwrap(),
                dec(1, 0),
            )
            .unwrap();

        let changes = holding_changes(&before, &after);
        assert_eq!(changes.len(), 2);
        assert!(changes.contains(&HoldingChange::Upsert {
            symbol: "XYZ".into(),
            num_shares: dec(2, 0)
        }));
        assert!(changes.contains(&HoldingChange::Remove {
            symbol: "ABC".into()
        }));
    }

    #[test]
    fn holding_changes_empty_when_unchanged() {
        let acc = account(dec(10, 0));
        assert!(holding_changes(&acc, &acc.clone()).is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Deposit(i64),
        Withdraw(i64),
        Buy(usize, i64, i64),
        Sell(usize, i64, i64),
    }

    fn op_strategy() -> impl proptest::strategy::Strategy<Value = Op> {
        use proptest::prelude::*;
        prop_oneof![
            (1i64..100_000).prop_map(Op::Deposit),
            (1i64..100_000).prop_map(Op::Withdraw),
            (0usize..3, 1i64..500, 1i64..20_000).prop_map(|(s, n, p)| Op::Buy(s, n, p)),
            (0usize..3, 1i64..500, 1i64..20_000).prop_map(|(s, n, p)| Op::Sell(s, n, p)),
        ]
    }

    proptest::proptest! {
        #[test]
        fn accepted_sequences_keep_cash_and_shares_positive(
            ops in proptest::collection::vec(op_strategy(), 1..60)
        ) {
            let symbols = ["ABC", "XYZ", "QRS"];
            let mut acc = account(Decimal::ZERO);
            for op in ops {
                let before = acc.clone();
                let outcome = match op {
                    Op::Deposit(cents) => {
                        acc.deposit(PositiveAmount::new(dec(cents, 2)).unwrap());
                        Ok(())
                    }
                    Op::Withdraw(cents) => acc
                        .withdraw(PositiveAmount::new(dec(cents, 2)).unwrap())
                        .map(|_| ()),
                    Op::Buy(s, tenths, cents) => acc
                        .buy(
                            &Symbol::parse(symbols[s]).unwrap(),
                            ShareCount::new(dec(tenths, 1)).unwrap(),
                            dec(cents, 2),
                        )
                        .map(|_| ()),
                    Op::Sell(s, tenths, cents) => acc
                        .sell(
                            &Symbol::parse(symbols[s]).unwrap(),
                            ShareCount::new(dec(tenths, 1)).unwrap(),
                            dec(cents, 2),
                        )
                        .map(|_| ()),
                };
                if outcome.is_err() {
                    proptest::prop_assert_eq!(&acc, &before);
                }
                proptest::prop_assert!(acc.cash() >= Decimal::ZERO);
                proptest::prop_assert!(acc.holdings.values().all(|s| *s > Decimal::ZERO));
            }
        }

        #[test]
        fn buy_then_sell_at_constant_price_restores_cash(
            start in 0i64..1_000_000,
            tenths in 1i64..1000,
            cents in 1i64..50_000,
        ) {
            let mut acc = account(dec(start, 2));
            let symbol = Symbol::parse("ABC").unwrap();
            let shares = ShareCount::new(dec(tenths, 1)).unwrap();
            if acc.buy(&symbol, shares, dec(cents, 2)).is_ok() {
                acc.sell(&symbol, shares, dec(cents, 2)).unwrap();
                proptest::prop_assert_eq!(acc.cash(), dec(start, 2));
                proptest::prop_assert!(acc.holdings.is_empty());
            }
        }

        #[test]
        fn withdraw_fails_iff_amount_exceeds_balance(
            start in 0i64..100_000,
            cents in 1i64..100_000,
        ) {
            let mut acc = account(dec(start, 2));
            let result = acc.withdraw(PositiveAmount::new(dec(cents, 2)).unwrap());
            if cents > start {
                let is_insufficient = matches!(result, Err(FolioError::InsufficientFunds { .. }));
                proptest::prop_assert!(is_insufficient);
                proptest::prop_assert_eq!(acc.cash(), dec(start, 2));
            } else {
                proptest::prop_assert_eq!(result.unwrap(), dec(start - cents, 2));
            }
        }
    }
}
