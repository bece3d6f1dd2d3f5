//! Request dispatch: one decoded request in, one response out.
//!
//! Exactly one ledger call per request and no other side effects beyond
//! metrics. Every business rejection comes back as a textual `Failure`;
//! nothing here can take the connection down.

use crate::domain::AccountError;
use crate::infrastructure::ledger::AccountLedger;
use crate::infrastructure::metrics::ServerMetrics;
use crate::infrastructure::protocol::{Request, Response};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, warn};

pub const MSG_LOGIN_OK: &str = "Login realizado com sucesso";
pub const MSG_WITHDRAW_OK: &str = "Saque realizado com sucesso";
pub const MSG_DEPOSIT_OK: &str = "Depósito realizado com sucesso";
pub const MSG_TRANSFER_OK: &str = "Transferência realizada com sucesso";
pub const MSG_NOT_FOUND: &str = "Cliente não encontrado";
pub const MSG_SOURCE_NOT_FOUND: &str = "Conta de origem não encontrada";
pub const MSG_DESTINATION_NOT_FOUND: &str = "Conta de destino não encontrada";
pub const MSG_INSUFFICIENT_FUNDS: &str = "Saldo insuficiente";
pub const MSG_SAME_ACCOUNT: &str = "Não é possível transferir para a mesma conta";
pub const MSG_UNRECOGNIZED: &str = "Comando não reconhecido";

pub struct Dispatcher {
    ledger: Arc<AccountLedger>,
    metrics: Arc<ServerMetrics>,
}

impl Dispatcher {
    pub fn new(ledger: Arc<AccountLedger>, metrics: Arc<ServerMetrics>) -> Self {
        Self { ledger, metrics }
    }

    /// Handles one raw protocol line. Parse failures get the generic
    /// failure response; the connection stays open either way.
    pub fn dispatch_line(&self, line: &str) -> Response {
        let request = match Request::decode(line) {
            Ok(request) => request,
            Err(err) => {
                warn!("Rejecting unparseable request: {}", err);
                self.metrics.record_parse_error();
                return Response::Failure(MSG_UNRECOGNIZED.to_string());
            }
        };

        let response = self.handle(&request);
        match response {
            Response::Success(_) => self.metrics.record_success(),
            Response::Failure(_) => self.metrics.record_failure(),
        }
        response
    }

    pub fn handle(&self, request: &Request) -> Response {
        debug!("Dispatching {:?}", request);
        match request {
            Request::Login { id } => match self.ledger.login(id) {
                Ok(()) => Response::Success(MSG_LOGIN_OK.to_string()),
                Err(err) => failure(err),
            },
            Request::Balance { id } => match self.ledger.balance_of(id) {
                Ok(balance) => Response::Success(format!("Saldo: {}", balance)),
                Err(err) => failure(err),
            },
            Request::Withdraw { id, amount } => match positive(*amount) {
                Err(response) => response,
                Ok(amount) => match self.ledger.withdraw(id, amount) {
                    Ok(()) => Response::Success(MSG_WITHDRAW_OK.to_string()),
                    Err(err) => failure(err),
                },
            },
            Request::Deposit { id, amount } => match positive(*amount) {
                Err(response) => response,
                Ok(amount) => match self.ledger.deposit(id, amount) {
                    Ok(()) => Response::Success(MSG_DEPOSIT_OK.to_string()),
                    Err(err) => failure(err),
                },
            },
            Request::Transfer { from, to, amount } => match positive(*amount) {
                Err(response) => response,
                Ok(amount) => match self.ledger.transfer(from, to, amount) {
                    Ok(()) => Response::Success(MSG_TRANSFER_OK.to_string()),
                    Err(err) => failure(err),
                },
            },
        }
    }
}

/// The wire grammar puts no bound on amounts; a non-positive one is a
/// protocol misuse, answered like an unparseable line.
fn positive(amount: Decimal) -> Result<Decimal, Response> {
    if amount > Decimal::ZERO {
        Ok(amount)
    } else {
        Err(Response::Failure(MSG_UNRECOGNIZED.to_string()))
    }
}

fn failure(err: AccountError) -> Response {
    let message = match err {
        AccountError::NotFound => MSG_NOT_FOUND,
        AccountError::SourceNotFound => MSG_SOURCE_NOT_FOUND,
        AccountError::DestinationNotFound => MSG_DESTINATION_NOT_FOUND,
        AccountError::InsufficientFunds { .. } => MSG_INSUFFICIENT_FUNDS,
        AccountError::SameAccount => MSG_SAME_ACCOUNT,
        AccountError::InvalidAmount(_) | AccountError::InvalidId(_) => MSG_UNRECOGNIZED,
    };
    Response::Failure(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Account, AccountId};
    use rust_decimal_macros::dec;

    fn dispatcher(seed: &[(&str, &str)]) -> Dispatcher {
        let accounts = seed
            .iter()
            .map(|(id, balance)| {
                Account::new(AccountId::new(*id).unwrap(), balance.parse().unwrap()).unwrap()
            })
            .collect();
        Dispatcher::new(
            Arc::new(AccountLedger::with_accounts(accounts).unwrap()),
            ServerMetrics::new(),
        )
    }

    fn expect_success(dispatcher: &Dispatcher, line: &str, message: &str) {
        assert_eq!(
            dispatcher.dispatch_line(line),
            Response::Success(message.to_string()),
            "for line {line:?}"
        );
    }

    fn expect_failure(dispatcher: &Dispatcher, line: &str, message: &str) {
        assert_eq!(
            dispatcher.dispatch_line(line),
            Response::Failure(message.to_string()),
            "for line {line:?}"
        );
    }

    #[test]
    fn login_against_known_and_unknown_accounts() {
        let dispatcher = dispatcher(&[("123", "10")]);
        expect_success(&dispatcher, "op:6|rg:123", MSG_LOGIN_OK);
        expect_failure(&dispatcher, "op:6|rg:999", MSG_NOT_FOUND);
    }

    #[test]
    fn balance_reports_the_current_amount() {
        let dispatcher = dispatcher(&[("123", "100.00")]);
        expect_success(&dispatcher, "op:1|rg:123", "Saldo: 100.00");
        expect_failure(&dispatcher, "op:1|rg:999", MSG_NOT_FOUND);
    }

    #[test]
    fn withdraw_and_deposit_follow_the_response_table() {
        let dispatcher = dispatcher(&[("1", "100")]);
        expect_success(&dispatcher, "op:2|rg:1|valor:40", MSG_WITHDRAW_OK);
        expect_failure(&dispatcher, "op:2|rg:1|valor:1000", MSG_INSUFFICIENT_FUNDS);
        expect_failure(&dispatcher, "op:2|rg:999|valor:1", MSG_NOT_FOUND);
        expect_success(&dispatcher, "op:3|rg:1|valor:40", MSG_DEPOSIT_OK);
        expect_failure(&dispatcher, "op:3|rg:999|valor:1", MSG_NOT_FOUND);
        expect_success(&dispatcher, "op:1|rg:1", "Saldo: 100");
    }

    #[test]
    fn transfer_covers_every_rejection() {
        let dispatcher = dispatcher(&[("1", "100"), ("2", "0")]);
        expect_failure(
            &dispatcher,
            "op:4|rg_origem:1|rg_destino:1|valor:10",
            MSG_SAME_ACCOUNT,
        );
        expect_failure(
            &dispatcher,
            "op:4|rg_origem:9|rg_destino:2|valor:10",
            MSG_SOURCE_NOT_FOUND,
        );
        expect_failure(
            &dispatcher,
            "op:4|rg_origem:1|rg_destino:9|valor:10",
            MSG_DESTINATION_NOT_FOUND,
        );
        expect_failure(
            &dispatcher,
            "op:4|rg_origem:1|rg_destino:2|valor:500",
            MSG_INSUFFICIENT_FUNDS,
        );
        expect_success(
            &dispatcher,
            "op:4|rg_origem:1|rg_destino:2|valor:50",
            MSG_TRANSFER_OK,
        );
        expect_success(&dispatcher, "op:1|rg:1", "Saldo: 50");
        expect_success(&dispatcher, "op:1|rg:2", "Saldo: 50");
    }

    #[test]
    fn transfer_then_failed_withdraw_scenario() {
        let dispatcher = dispatcher(&[("1", "100"), ("2", "0")]);
        expect_success(
            &dispatcher,
            "op:4|rg_origem:1|rg_destino:2|valor:50",
            MSG_TRANSFER_OK,
        );
        expect_failure(&dispatcher, "op:2|rg:1|valor:100", MSG_INSUFFICIENT_FUNDS);
        expect_success(&dispatcher, "op:1|rg:1", "Saldo: 50");
    }

    #[test]
    fn garbage_and_non_positive_amounts_are_unrecognized() {
        let dispatcher = dispatcher(&[("1", "100")]);
        expect_failure(&dispatcher, "garbage", MSG_UNRECOGNIZED);
        expect_failure(&dispatcher, "op:2|rg:1|valor:0", MSG_UNRECOGNIZED);
        expect_failure(&dispatcher, "op:2|rg:1|valor:-5", MSG_UNRECOGNIZED);
        expect_failure(&dispatcher, "op:3|rg:1|valor:-5", MSG_UNRECOGNIZED);
        expect_failure(
            &dispatcher,
            "op:4|rg_origem:1|rg_destino:2|valor:0",
            MSG_UNRECOGNIZED,
        );
        // The ledger was never touched.
        expect_success(&dispatcher, "op:1|rg:1", "Saldo: 100");
    }

    #[test]
    fn dispatch_updates_metrics() {
        let metrics = ServerMetrics::new();
        let ledger = Arc::new(
            AccountLedger::with_accounts(vec![Account::new(
                AccountId::new("1").unwrap(),
                dec!(5),
            )
            .unwrap()])
            .unwrap(),
        );
        let dispatcher = Dispatcher::new(ledger, Arc::clone(&metrics));

        dispatcher.dispatch_line("op:1|rg:1");
        dispatcher.dispatch_line("op:1|rg:999");
        dispatcher.dispatch_line("nonsense");

        use std::sync::atomic::Ordering;
        assert_eq!(metrics.requests_succeeded.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.requests_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.parse_errors.load(Ordering::Relaxed), 1);
    }
}
