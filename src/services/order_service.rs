use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{LockType, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{
        OrderList, PrecreateOrderRequest, SaveOrderRequest, SavedOrder, VerifyPaymentData,
        VerifyPaymentRequest,
    },
    dto::webhooks::{PaymentNotice, WebhookOutcome},
    entity::orders::{
        ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
    },
    error::{AppError, AppResult},
    gateway::GatewayOrderDescriptor,
    middleware::auth::{AuthUser, ensure_verified},
    models::{Order, STATUS_PENDING, STATUS_SUCCESS, map_gateway_status},
    response::{ApiResponse, Meta},
    services::customer_identity::{
        CustomerIdentity, IdentitySources, find_user_by_contact, resolve_customer_identity,
    },
    signature,
    state::AppState,
};

/// Create a gateway order and, when the caller is known, a provisional
/// pending row keyed by the new gateway order id.
///
/// The row insert is best-effort: the webhook path can still create the
/// row later, so a store hiccup here must not fail the checkout.
pub async fn precreate_order(
    state: &AppState,
    payload: PrecreateOrderRequest,
) -> AppResult<ApiResponse<GatewayOrderDescriptor>> {
    if payload.amount <= 0 {
        return Err(AppError::BadRequest("Amount must be positive".into()));
    }
    if payload.currency.trim().is_empty() {
        return Err(AppError::BadRequest("Currency is required".into()));
    }

    let receipt = Uuid::new_v4().to_string();
    let descriptor = state
        .gateway
        .create_order(payload.amount, &payload.currency, &receipt)
        .await?;

    if let Some(user_id) = payload.user_id {
        let pending = OrderActive {
            id: Set(Uuid::new_v4()),
            gateway_order_id: Set(descriptor.id.clone()),
            payment_id: Set(None),
            payment_signature: Set(None),
            amount: Set(payload.amount),
            currency: Set(payload.currency.clone()),
            items: Set(Value::Array(payload.items.clone())),
            status: Set(STATUS_PENDING.into()),
            user_id: Set(Some(user_id)),
            customer_email: Set(None),
            customer_email_canonical: Set(None),
            customer_phone: Set(None),
            customer_phone_normalized: Set(None),
            created_at: NotSet,
            updated_at: NotSet,
        };
        if let Err(err) = pending.insert(&state.orm).await {
            tracing::warn!(
                gateway_order_id = %descriptor.id,
                error = %err,
                "pending order insert failed, webhook will recreate"
            );
        }
    }

    if let Err(err) = log_audit(
        &state.pool,
        payload.user_id,
        "order_precreated",
        Some("orders"),
        Some(serde_json::json!({ "gateway_order_id": descriptor.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Gateway order created",
        descriptor,
        Some(Meta::empty()),
    ))
}

/// Client-side payment-success callback. This is the one place a forged
/// request could attribute an order to the wrong account, so it demands a
/// provider-verified identity, an owner match, and a valid payment proof
/// before touching the store.
pub async fn record_payment(
    state: &AppState,
    user: &AuthUser,
    payload: SaveOrderRequest,
) -> AppResult<ApiResponse<SavedOrder>> {
    ensure_verified(user)?;
    if payload.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }
    if !signature::verify_callback_signature(
        &payload.gateway_order_id,
        &payload.payment_id,
        &payload.signature,
        state.config.gateway_key_secret.as_bytes(),
    ) {
        return Err(AppError::InvalidSignature);
    }

    let identity = resolve_customer_identity(
        state,
        IdentitySources {
            explicit_email: payload.customer_email.as_deref(),
            explicit_phone: payload.customer_phone.as_deref(),
            user_id: Some(user.user_id),
            auth: Some(user),
            ..Default::default()
        },
    )
    .await;

    let txn = state.orm.begin().await?;

    // Replay: this payment already produced a success row.
    if let Some(existing) = Orders::find()
        .filter(OrderCol::PaymentId.eq(payload.payment_id.clone()))
        .filter(OrderCol::Status.eq(STATUS_SUCCESS))
        .one(&txn)
        .await?
    {
        txn.commit().await?;
        return Ok(ApiResponse::success(
            "Payment already recorded",
            SavedOrder {
                order: order_from_entity(existing),
            },
            Some(Meta::empty()),
        ));
    }

    let current = Orders::find()
        .filter(OrderCol::GatewayOrderId.eq(payload.gateway_order_id.clone()))
        .lock(LockType::Update)
        .one(&txn)
        .await?;

    let order = match current {
        Some(row) if row.status == STATUS_SUCCESS => {
            // Terminal row for this order attempt under a different payment
            // id. Never rewritten; surfaced unchanged.
            tracing::warn!(
                gateway_order_id = %row.gateway_order_id,
                payment_id = %payload.payment_id,
                "callback for an order attempt that already succeeded"
            );
            row
        }
        Some(row) => {
            let sticky_user = row.user_id.or(Some(user.user_id));
            let mut active: OrderActive = row.into();
            active.payment_id = Set(Some(payload.payment_id.clone()));
            active.payment_signature = Set(Some(payload.signature.clone()));
            active.status = Set(STATUS_SUCCESS.into());
            active.amount = Set(payload.amount);
            active.currency = Set(payload.currency.clone());
            if !payload.items.is_empty() {
                active.items = Set(Value::Array(payload.items.clone()));
            }
            active.user_id = Set(sticky_user);
            apply_identity(&mut active, &identity);
            active.updated_at = Set(Utc::now().into());
            active.update(&txn).await?
        }
        None => {
            // Pre-create never ran or its insert failed. Insert directly in
            // success state; the conflict target absorbs a race against a
            // concurrent webhook insert for the same gateway order.
            let active = OrderActive {
                id: Set(Uuid::new_v4()),
                gateway_order_id: Set(payload.gateway_order_id.clone()),
                payment_id: Set(Some(payload.payment_id.clone())),
                payment_signature: Set(Some(payload.signature.clone())),
                amount: Set(payload.amount),
                currency: Set(payload.currency.clone()),
                items: Set(Value::Array(payload.items.clone())),
                status: Set(STATUS_SUCCESS.into()),
                user_id: Set(Some(user.user_id)),
                customer_email: Set(identity.email.clone()),
                customer_email_canonical: Set(identity.email_canonical()),
                customer_phone: Set(identity.phone.clone()),
                customer_phone_normalized: Set(identity.phone_normalized()),
                created_at: NotSet,
                updated_at: NotSet,
            };
            Orders::insert(active)
                .on_conflict(
                    OnConflict::column(OrderCol::GatewayOrderId)
                        .update_columns([
                            OrderCol::PaymentId,
                            OrderCol::PaymentSignature,
                            OrderCol::Status,
                            OrderCol::Amount,
                            OrderCol::Currency,
                            OrderCol::Items,
                            OrderCol::UserId,
                            OrderCol::CustomerEmail,
                            OrderCol::CustomerEmailCanonical,
                            OrderCol::CustomerPhone,
                            OrderCol::CustomerPhoneNormalized,
                        ])
                        .to_owned(),
                )
                .exec_with_returning(&txn)
                .await?
        }
    };

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_paid",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "payment_id": payload.payment_id,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Payment recorded",
        SavedOrder {
            order: order_from_entity(order),
        },
        Some(Meta::empty()),
    ))
}

/// Gateway webhook apply. Authenticated upstream by the body HMAC only;
/// tolerates running before, after, or interleaved with the client
/// callback for the same payment.
pub async fn apply_gateway_event(
    state: &AppState,
    notice: PaymentNotice,
) -> AppResult<ApiResponse<WebhookOutcome>> {
    let mut notice = notice;
    let mapped_status = map_gateway_status(&notice.status);

    // Events sometimes arrive without contact or amount data; the payment
    // record itself is the fallback. Fetch failure just leaves the gaps.
    if (notice.email.is_none() && notice.contact.is_none()) || notice.amount.is_none() {
        if let Some(payment) = state.gateway.fetch_payment(&notice.payment_id).await {
            notice.email = notice.email.or(payment.email);
            notice.contact = notice.contact.or(payment.contact);
            notice.amount = notice.amount.or(payment.amount);
            notice.currency = notice.currency.or(payment.currency);
        }
    }

    let txn = state.orm.begin().await?;

    if Orders::find()
        .filter(OrderCol::PaymentId.eq(notice.payment_id.clone()))
        .filter(OrderCol::Status.eq(STATUS_SUCCESS))
        .one(&txn)
        .await?
        .is_some()
    {
        txn.commit().await?;
        tracing::info!(payment_id = %notice.payment_id, "event replay, already processed");
        return Ok(ApiResponse::success(
            "Event already processed",
            WebhookOutcome {
                updated: false,
                created: false,
            },
            Some(Meta::empty()),
        ));
    }

    let current = Orders::find()
        .filter(OrderCol::GatewayOrderId.eq(notice.gateway_order_id.clone()))
        .lock(LockType::Update)
        .one(&txn)
        .await?;

    let outcome = match current {
        Some(row) => {
            let terminal = row.status == STATUS_SUCCESS;
            let payment_slot_free = row.payment_id.is_none()
                || row.payment_id.as_deref() == Some(notice.payment_id.as_str());
            let missing_email = row.customer_email.is_none();
            let missing_phone = row.customer_phone.is_none();
            let missing_user = row.user_id.is_none();

            let identity = gateway_identity(state, &notice).await;
            let mut active: OrderActive = row.into();
            if payment_slot_free {
                active.payment_id = Set(Some(notice.payment_id.clone()));
            }
            if !terminal {
                active.status = Set(mapped_status.clone());
            }
            if missing_email && identity.email.is_some() {
                active.customer_email = Set(identity.email.clone());
                active.customer_email_canonical = Set(identity.email_canonical());
            }
            if missing_phone && identity.phone.is_some() {
                active.customer_phone = Set(identity.phone.clone());
                active.customer_phone_normalized = Set(identity.phone_normalized());
            }
            if missing_user {
                if let Some(user_id) = find_user_by_contact(
                    &state.pool,
                    notice.email.as_deref(),
                    notice.contact.as_deref(),
                )
                .await
                {
                    active.user_id = Set(Some(user_id));
                }
            }
            active.updated_at = Set(Utc::now().into());
            active.update(&txn).await?;
            WebhookOutcome {
                updated: true,
                created: false,
            }
        }
        None => {
            // No pre-created row: the webhook is the first writer. The
            // provisional row carries whatever the event knows; a later
            // callback fills in the rest.
            let user_id = find_user_by_contact(
                &state.pool,
                notice.email.as_deref(),
                notice.contact.as_deref(),
            )
            .await;
            let identity = gateway_identity(state, &notice).await;
            let active = OrderActive {
                id: Set(Uuid::new_v4()),
                gateway_order_id: Set(notice.gateway_order_id.clone()),
                payment_id: Set(Some(notice.payment_id.clone())),
                payment_signature: Set(None),
                amount: Set(notice.amount.unwrap_or(0)),
                currency: Set(notice.currency.clone().unwrap_or_default()),
                items: Set(Value::Array(vec![])),
                status: Set(mapped_status.clone()),
                user_id: Set(user_id),
                customer_email: Set(identity.email.clone()),
                customer_email_canonical: Set(identity.email_canonical()),
                customer_phone: Set(identity.phone.clone()),
                customer_phone_normalized: Set(identity.phone_normalized()),
                created_at: NotSet,
                updated_at: NotSet,
            };
            Orders::insert(active)
                .on_conflict(
                    OnConflict::column(OrderCol::GatewayOrderId)
                        .update_columns([OrderCol::PaymentId, OrderCol::Status])
                        .to_owned(),
                )
                .exec_with_returning(&txn)
                .await?;
            WebhookOutcome {
                updated: false,
                created: true,
            }
        }
    };

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        None,
        "webhook_applied",
        Some("orders"),
        Some(serde_json::json!({
            "gateway_order_id": notice.gateway_order_id,
            "payment_id": notice.payment_id,
            "event": notice.event,
            "status": mapped_status,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let message = if outcome.created {
        "Order created from event"
    } else {
        "Order updated from event"
    };
    Ok(ApiResponse::success(message, outcome, Some(Meta::empty())))
}

/// Orders for the calling customer, matched by canonical email. An
/// unresolvable identity yields an empty list, never an error and never
/// another customer's orders.
pub async fn list_my_orders(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OrderList>> {
    let identity = resolve_customer_identity(
        state,
        IdentitySources {
            user_id: Some(user.user_id),
            auth: Some(user),
            ..Default::default()
        },
    )
    .await;

    let Some(canonical) = identity.email_canonical() else {
        return Ok(ApiResponse::success(
            "Ok",
            OrderList { items: vec![] },
            Some(Meta::empty()),
        ));
    };

    let orders = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE customer_email_canonical = $1 ORDER BY created_at DESC",
    )
    .bind(&canonical)
    .fetch_all(&state.pool)
    .await?;

    let total = orders.len() as i64;
    let meta = Meta::new(1, total, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

/// Recompute and compare the callback proof. The envelope's `success`
/// flag mirrors the comparison result.
pub fn verify_payment(
    state: &AppState,
    payload: &VerifyPaymentRequest,
) -> AppResult<ApiResponse<VerifyPaymentData>> {
    if payload.gateway_order_id.is_empty() || payload.payment_id.is_empty() {
        return Err(AppError::BadRequest(
            "gateway_order_id and payment_id are required".into(),
        ));
    }
    let valid = signature::verify_callback_signature(
        &payload.gateway_order_id,
        &payload.payment_id,
        &payload.signature,
        state.config.gateway_key_secret.as_bytes(),
    );
    let response = if valid {
        ApiResponse::success("Signature verified", VerifyPaymentData { valid }, None)
    } else {
        ApiResponse::failure("Signature mismatch", Some(VerifyPaymentData { valid }))
    };
    Ok(response)
}

async fn gateway_identity(state: &AppState, notice: &PaymentNotice) -> CustomerIdentity {
    resolve_customer_identity(
        state,
        IdentitySources {
            gateway_email: notice.email.as_deref(),
            gateway_contact: notice.contact.as_deref(),
            ..Default::default()
        },
    )
    .await
}

fn apply_identity(active: &mut OrderActive, identity: &CustomerIdentity) {
    if identity.email.is_some() {
        active.customer_email = Set(identity.email.clone());
        active.customer_email_canonical = Set(identity.email_canonical());
    }
    if identity.phone.is_some() {
        active.customer_phone = Set(identity.phone.clone());
        active.customer_phone_normalized = Set(identity.phone_normalized());
    }
}

fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        gateway_order_id: model.gateway_order_id,
        payment_id: model.payment_id,
        payment_signature: model.payment_signature,
        amount: model.amount,
        currency: model.currency,
        items: model.items,
        status: model.status,
        user_id: model.user_id,
        customer_email: model.customer_email,
        customer_email_canonical: model.customer_email_canonical,
        customer_phone: model.customer_phone,
        customer_phone_normalized: model.customer_phone_normalized,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
