use crate::application::engine::DepositRequest;
use crate::domain::directory::UserProfile;
use crate::domain::money::CurrencyCode;
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use uuid::Uuid;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Register,
    Deposit,
    Remit,
}

/// One raw scenario row. Which optional columns are required depends on
/// `type`; see [`Command`].
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CommandRecord {
    #[serde(rename = "type")]
    pub r#type: CommandType,
    pub user: Uuid,
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
    #[serde(default)]
    pub target_currency: Option<CurrencyCode>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A validated scenario step.
#[derive(Debug, PartialEq, Clone)]
pub enum Command {
    /// Adds a sender to the user directory.
    Register(UserProfile),
    Deposit {
        request: DepositRequest,
        idempotency_key: Option<String>,
    },
    /// Quotes `amount` from `from` to `to`, then sends it.
    Remit {
        user: Uuid,
        from: CurrencyCode,
        to: CurrencyCode,
        amount: Decimal,
        recipient_email: String,
        recipient_name: String,
        idempotency_key: Option<String>,
    },
}

fn required<T>(value: Option<T>, column: &str, kind: CommandType) -> Result<T> {
    value.ok_or_else(|| {
        PaymentError::ValidationError(format!("{kind:?} row is missing `{column}`").to_lowercase())
    })
}

impl TryFrom<CommandRecord> for Command {
    type Error = PaymentError;

    fn try_from(record: CommandRecord) -> Result<Self> {
        let kind = record.r#type;
        match kind {
            CommandType::Register => {
                let email = required(record.email, "email", kind)?;
                let name = record.name.unwrap_or_default();
                let (first_name, last_name) = match name.split_once(char::is_whitespace) {
                    Some((first, last)) => (first.to_string(), last.trim().to_string()),
                    None => (name, String::new()),
                };
                Ok(Command::Register(UserProfile {
                    id: record.user,
                    first_name,
                    last_name,
                    email,
                }))
            }
            CommandType::Deposit => Ok(Command::Deposit {
                request: DepositRequest {
                    user_id: record.user,
                    currency: required(record.currency, "currency", kind)?,
                    amount: required(record.amount, "amount", kind)?,
                },
                idempotency_key: record.idempotency_key,
            }),
            CommandType::Remit => Ok(Command::Remit {
                user: record.user,
                from: required(record.currency, "currency", kind)?,
                to: required(record.target_currency, "target_currency", kind)?,
                amount: required(record.amount, "amount", kind)?,
                recipient_email: required(record.email, "email", kind)?,
                recipient_name: required(record.name, "name", kind)?,
                idempotency_key: record.idempotency_key,
            }),
        }
    }
}

/// Reads scenario commands from a CSV source.
///
/// Whitespace around fields is trimmed and short rows are accepted; missing
/// trailing columns read as empty.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily parses and validates each row.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader
            .into_deserialize::<CommandRecord>()
            .map(|result| result.map_err(PaymentError::from).and_then(Command::try_from))
    }
}
