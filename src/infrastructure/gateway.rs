use crate::domain::payment_method::{CardDetails, PaymentMethodId};
use crate::domain::ports::{
    GatewayClient, GatewayPaymentMethod, GatewayResult, IntentStatus, PaymentIntent, Payout,
};
use crate::domain::wallet::CustomerId;
use crate::error::GatewayError;
use async_trait::async_trait;
use rand::RngCore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

fn sim_id(prefix: &str) -> String {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{prefix}_{}", hex::encode(bytes))
}

#[derive(Default)]
struct Inner {
    customers: HashMap<CustomerId, String>,
    methods: HashMap<PaymentMethodId, GatewayPaymentMethod>,
    attachments: HashMap<PaymentMethodId, CustomerId>,
    intents: HashMap<String, PaymentIntent>,
    // idempotency key -> gateway object id
    idempotent: HashMap<String, String>,
    declined_methods: HashSet<PaymentMethodId>,
    fail_next: Option<GatewayError>,
}

impl Inner {
    fn take_injected_failure(&mut self) -> GatewayResult<()> {
        match self.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Deterministic local stand-in for the card-payment gateway, used by the
/// CLI and the test suite. Implements the full [`GatewayClient`] contract,
/// including idempotency keys, and can be scripted to decline a method or to
/// fail the next call outright.
#[derive(Default, Clone)]
pub struct SimulatedGateway {
    inner: Arc<RwLock<Inner>>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a payment method the gateway will recognise, mirroring the
    /// processor's tokenized test cards.
    pub async fn register_method(&self, method: PaymentMethodId, brand: &str, last4: &str) {
        let mut inner = self.inner.write().await;
        inner.methods.insert(
            method.clone(),
            GatewayPaymentMethod {
                id: method,
                kind: "card".to_string(),
                card: Some(CardDetails {
                    brand: brand.to_string(),
                    last4: last4.to_string(),
                    exp_month: 12,
                    exp_year: 2030,
                }),
            },
        );
    }

    /// Marks a method so confirmation reports a non-succeeded intent.
    pub async fn decline_method(&self, method: PaymentMethodId) {
        self.inner.write().await.declined_methods.insert(method);
    }

    /// The next gateway call, whatever it is, fails with `err`.
    pub async fn fail_next_call(&self, err: GatewayError) {
        self.inner.write().await.fail_next = Some(err);
    }
}

#[async_trait]
impl GatewayClient for SimulatedGateway {
    async fn create_customer(&self, email: &str) -> GatewayResult<CustomerId> {
        let mut inner = self.inner.write().await;
        inner.take_injected_failure()?;
        let id = CustomerId(sim_id("cus"));
        inner.customers.insert(id.clone(), email.to_string());
        Ok(id)
    }

    async fn attach_payment_method(
        &self,
        method: &PaymentMethodId,
        customer: &CustomerId,
    ) -> GatewayResult<()> {
        let mut inner = self.inner.write().await;
        inner.take_injected_failure()?;
        if !inner.methods.contains_key(method) {
            return Err(GatewayError::ResourceMissing {
                id: method.to_string(),
            });
        }
        if !inner.customers.contains_key(customer) {
            return Err(GatewayError::ResourceMissing {
                id: customer.to_string(),
            });
        }
        // Re-attaching to the same customer is a no-op; attaching elsewhere
        // moves the method.
        inner.attachments.insert(method.clone(), customer.clone());
        Ok(())
    }

    async fn retrieve_payment_method(
        &self,
        method: &PaymentMethodId,
    ) -> GatewayResult<GatewayPaymentMethod> {
        let mut inner = self.inner.write().await;
        inner.take_injected_failure()?;
        inner
            .methods
            .get(method)
            .cloned()
            .ok_or_else(|| GatewayError::ResourceMissing {
                id: method.to_string(),
            })
    }

    async fn detach_payment_method(&self, method: &PaymentMethodId) -> GatewayResult<()> {
        let mut inner = self.inner.write().await;
        inner.take_injected_failure()?;
        if inner.attachments.remove(method).is_none() {
            return Err(GatewayError::ResourceMissing {
                id: method.to_string(),
            });
        }
        Ok(())
    }

    async fn create_payment_intent(
        &self,
        amount_minor: i64,
        _currency: &str,
        customer: &CustomerId,
        _method: Option<&PaymentMethodId>,
        idempotency_key: &str,
    ) -> GatewayResult<PaymentIntent> {
        let mut inner = self.inner.write().await;
        inner.take_injected_failure()?;
        if !inner.customers.contains_key(customer) {
            return Err(GatewayError::ResourceMissing {
                id: customer.to_string(),
            });
        }
        if let Some(existing_id) = inner.idempotent.get(idempotency_key)
            && let Some(existing) = inner.intents.get(existing_id)
        {
            return Ok(existing.clone());
        }
        let intent = PaymentIntent {
            id: sim_id("pi"),
            client_secret: sim_id("secret"),
            status: IntentStatus::RequiresConfirmation,
            amount_minor,
        };
        inner
            .idempotent
            .insert(idempotency_key.to_string(), intent.id.clone());
        inner.intents.insert(intent.id.clone(), intent.clone());
        Ok(intent)
    }

    async fn confirm_payment_intent(
        &self,
        intent_id: &str,
        method: &PaymentMethodId,
    ) -> GatewayResult<PaymentIntent> {
        let mut inner = self.inner.write().await;
        inner.take_injected_failure()?;
        if !inner.methods.contains_key(method) {
            return Err(GatewayError::ResourceMissing {
                id: method.to_string(),
            });
        }
        let declined = inner.declined_methods.contains(method);
        let intent = inner.intents.get_mut(intent_id).ok_or_else(|| {
            GatewayError::ResourceMissing {
                id: intent_id.to_string(),
            }
        })?;
        intent.status = if declined {
            IntentStatus::Failed
        } else {
            IntentStatus::Succeeded
        };
        Ok(intent.clone())
    }

    async fn create_payout(
        &self,
        _amount_minor: i64,
        customer: &CustomerId,
        idempotency_key: &str,
    ) -> GatewayResult<Payout> {
        let mut inner = self.inner.write().await;
        inner.take_injected_failure()?;
        if !inner.customers.contains_key(customer) {
            return Err(GatewayError::ResourceMissing {
                id: customer.to_string(),
            });
        }
        if let Some(existing_id) = inner.idempotent.get(idempotency_key) {
            return Ok(Payout {
                id: existing_id.clone(),
            });
        }
        let payout = Payout { id: sim_id("po") };
        inner
            .idempotent
            .insert(idempotency_key.to_string(), payout.id.clone());
        Ok(payout)
    }
}
