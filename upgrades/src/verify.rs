//! Evidence that an upgrade preserved state and exposed new behavior.
//!
//! The harness captures, compares and probes. It never decides whether an
//! upgrade passed; callers assert on what it returns.
use std::time::Duration;

use alloy_primitives::{hex, Address, Bytes, B256};
use alloy_sol_types::SolCall;

use crate::{
    config::Config,
    endpoint::{bounded, Endpoint, EndpointError},
    erc1967,
    handle::ProxyHandle,
    Error, Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Source {
    Slot(B256),
    Call(Bytes),
}

/// One observable field of a proxy's state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Probe {
    label: String,
    source: Source,
}

impl Probe {
    /// Reads the raw storage word at `slot`.
    pub fn slot(label: impl Into<String>, slot: impl Into<B256>) -> Self {
        Self { label: label.into(), source: Source::Slot(slot.into()) }
    }

    /// Performs a read-only call with raw `input`.
    pub fn call(label: impl Into<String>, input: impl Into<Bytes>) -> Self {
        Self { label: label.into(), source: Source::Call(input.into()) }
    }

    /// Performs a read-only call of `call`.
    pub fn sol_call<C: SolCall>(label: impl Into<String>, call: &C) -> Self {
        Self::call(label, call.abi_encode())
    }

    /// Name of the field.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// A captured field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    /// Name of the field.
    pub label: String,
    /// Raw value: a storage word or ABI-encoded return data.
    pub value: Bytes,
}

/// State of a proxy at one point in time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    /// The observed proxy.
    pub proxy: Address,
    /// Implementation the proxy pointed at.
    pub implementation: Option<Address>,
    /// Captured fields, in probe order.
    pub fields: Vec<Field>,
}

impl Snapshot {
    /// Value captured under `label`.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&Bytes> {
        self.fields
            .iter()
            .find(|field| field.label == label)
            .map(|field| &field.value)
    }
}

/// How one field differs between two snapshots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDelta {
    /// Name of the field.
    pub label: String,
    /// Value before, `None` if it was not captured.
    pub before: Option<Bytes>,
    /// Value after, `None` if it was not captured.
    pub after: Option<Bytes>,
}

impl FieldDelta {
    /// Whether the field was captured on both sides with equal values.
    #[must_use]
    pub fn is_preserved(&self) -> bool {
        self.before.is_some() && self.before == self.after
    }
}

/// Field-by-field comparison of two snapshots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateDelta {
    /// Implementation before.
    pub implementation_before: Option<Address>,
    /// Implementation after.
    pub implementation_after: Option<Address>,
    /// Every field captured on either side.
    pub fields: Vec<FieldDelta>,
}

impl StateDelta {
    /// Fields with equal values on both sides.
    pub fn preserved(&self) -> impl Iterator<Item = &FieldDelta> {
        self.fields.iter().filter(|field| field.is_preserved())
    }

    /// Fields that differ or are missing on one side.
    pub fn changed(&self) -> impl Iterator<Item = &FieldDelta> {
        self.fields.iter().filter(|field| !field.is_preserved())
    }

    /// Whether the field `label` was preserved.
    #[must_use]
    pub fn is_preserved(&self, label: &str) -> bool {
        self.fields
            .iter()
            .any(|field| field.label == label && field.is_preserved())
    }

    /// Whether the proxy points at another implementation.
    #[must_use]
    pub fn implementation_changed(&self) -> bool {
        self.implementation_before != self.implementation_after
    }
}

/// Compares two snapshots of the same proxy.
///
/// Fields are matched by label: first those of `before` in order, then
/// those only `after` has.
#[must_use]
pub fn compare_states(before: &Snapshot, after: &Snapshot) -> StateDelta {
    let mut fields: Vec<FieldDelta> = before
        .fields
        .iter()
        .map(|field| FieldDelta {
            label: field.label.clone(),
            before: Some(field.value.clone()),
            after: after.get(&field.label).cloned(),
        })
        .collect();
    let added = after
        .fields
        .iter()
        .filter(|field| before.get(&field.label).is_none())
        .map(|field| FieldDelta {
            label: field.label.clone(),
            before: None,
            after: Some(field.value.clone()),
        });
    fields.extend(added);
    StateDelta {
        implementation_before: before.implementation,
        implementation_after: after.implementation,
        fields,
    }
}

/// Reads proxies through an [`Endpoint`].
#[derive(Clone, Debug)]
pub struct Verifier<E> {
    endpoint: E,
    reader: Address,
    timeout: Duration,
}

impl<E: Endpoint> Verifier<E> {
    /// Creates a verifier issuing read-only calls from `reader`.
    #[must_use]
    pub fn new(endpoint: E, reader: Address) -> Self {
        let timeout = Config::default().call_timeout();
        Self { endpoint, reader, timeout }
    }

    /// Bounds every endpoint call by `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The endpoint reads go through.
    #[must_use]
    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Reads every probe against `proxy`.
    ///
    /// # Errors
    ///
    /// * [`Error::VerificationUnavailable`] - If a read fails or stalls.
    pub async fn capture_state(
        &self,
        proxy: Address,
        probes: &[Probe],
    ) -> Result<Snapshot> {
        let implementation = self.implementation(proxy).await?;
        let mut fields = Vec::with_capacity(probes.len());
        for probe in probes {
            let value = match &probe.source {
                Source::Slot(slot) => self
                    .bounded(self.endpoint.storage_at(proxy, *slot))
                    .await
                    .map(|word| Bytes::copy_from_slice(word.as_slice())),
                Source::Call(input) => {
                    self.bounded(self.endpoint.call(self.reader, proxy, input))
                        .await
                }
            }
            .map_err(|e| Error::VerificationUnavailable {
                proxy,
                reason: format!("probe `{}`: {e}", probe.label),
            })?;
            fields.push(Field { label: probe.label.clone(), value });
        }
        Ok(Snapshot { proxy, implementation, fields })
    }

    /// Executes `call` through the proxy and decodes its result.
    ///
    /// Meant for behavior only the new implementation has.
    ///
    /// # Errors
    ///
    /// * [`Error::NotInInterface`] - If the handle's interface lacks the
    ///   function.
    /// * [`Error::Endpoint`] - If the call reverts or stalls.
    /// * [`Error::Decode`] - If the return data is malformed.
    pub async fn assert_behavior<C: SolCall>(
        &self,
        handle: &ProxyHandle,
        call: &C,
    ) -> Result<C::Return> {
        let input = handle.encode(call)?;
        let output = self
            .bounded(self.endpoint.call(self.reader, handle.proxy, &input))
            .await
            .map_err(|e| {
                tracing::debug!(
                    proxy = %handle.proxy,
                    function = C::SIGNATURE,
                    input = %hex::encode(&input),
                    error = %e,
                    "behavior probe failed"
                );
                Error::Endpoint(e)
            })?;
        handle.decode::<C>(&output)
    }

    /// The implementation `proxy` currently points at.
    ///
    /// # Errors
    ///
    /// * [`Error::VerificationUnavailable`] - If the slot cannot be read.
    pub async fn implementation(
        &self,
        proxy: Address,
    ) -> Result<Option<Address>> {
        self.bounded(erc1967::implementation(&self.endpoint, proxy))
            .await
            .map_err(|e| Error::VerificationUnavailable {
                proxy,
                reason: e.to_string(),
            })
    }

    async fn bounded<T>(
        &self,
        operation: impl std::future::Future<Output = Result<T, EndpointError>>,
    ) -> Result<T, EndpointError> {
        bounded(self.timeout, operation).await
    }
}
