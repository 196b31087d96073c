use axum::{
    extract::{Multipart, Path, State},
    response::Json,
};
use ledger::ExpenseStatus;
use tracing::{info, instrument, warn};

use crate::auth::AdminUser;
use crate::error::AppError;
use crate::handlers::expenses::ExpenseResponse;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use crate::storage::content_type_for;
use crate::zoho::AttachmentResource;

/// Upload a receipt for an expense. The file is stored locally and linked on
/// the record; if the expense is already posted upstream the attachment is
/// forwarded immediately, with failures recorded on the record rather than
/// failing the upload.
#[utoipa::path(
    post,
    path = "/api/v1/receipts/{expense_id}",
    tag = "receipts",
    params(("expense_id" = i32, Path, description = "Expense ID")),
    request_body(content = Vec<u8>, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Receipt attached", body = ApiResponse<ExpenseResponse>),
        (status = 400, description = "No file in upload", body = ErrorResponse),
        (status = 404, description = "Expense not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, multipart))]
pub async fn upload_receipt(
    Path(expense_id): Path<i32>,
    State(state): State<AppState>,
    AdminUser(_user): AdminUser,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<ExpenseResponse>>, AppError> {
    let record = state
        .ledger
        .get(expense_id)
        .await?
        .ok_or_else(|| AppError::NotFound("expense not found".to_string()))?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(format!("invalid multipart payload: {err}")))?
    {
        if field.file_name().is_some() || field.name() == Some("attachment") {
            let filename = field.file_name().unwrap_or("receipt").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|err| AppError::BadRequest(format!("failed to read upload: {err}")))?;
            upload = Some((filename, bytes.to_vec()));
            break;
        }
    }
    let Some((filename, bytes)) = upload else {
        return Err(AppError::BadRequest(
            "no file field found in upload".to_string(),
        ));
    };

    let stored = state
        .storage
        .save(expense_id, &filename, &bytes)
        .await
        .map_err(|err| AppError::Internal(anyhow::anyhow!("failed to store receipt: {err}")))?;

    state
        .ledger
        .add_receipt(expense_id, &stored.filename, &stored.url)
        .await?
        .ok_or_else(|| AppError::NotFound("expense not found".to_string()))?;

    info!(expense_id = expense_id, filename = %stored.filename, "Receipt stored");

    // Already posted upstream: forward the attachment right away
    if record.expense.status == ExpenseStatus::Approved {
        let upstream = match (
            record.expense.zoho_expense_id.as_deref(),
            record.expense.zoho_journal_id.as_deref(),
        ) {
            (Some(id), _) => Some((AttachmentResource::Expense, id.to_string())),
            (None, Some(id)) => Some((AttachmentResource::Journal, id.to_string())),
            (None, None) => None,
        };

        if let Some((resource, upstream_id)) = upstream {
            match state
                .zoho
                .upload_attachment(
                    resource,
                    &upstream_id,
                    &stored.filename,
                    bytes,
                    content_type_for(&stored.filename),
                )
                .await
            {
                Ok(()) => {
                    state.ledger.set_attachment_errors(expense_id, None).await?;
                }
                Err(err) => {
                    warn!(expense_id = expense_id, "Attachment upload failed: {err}");
                    state
                        .ledger
                        .set_attachment_errors(
                            expense_id,
                            Some(format!("{}: {}", stored.filename, err)),
                        )
                        .await?;
                }
            }
        }
    }

    let record = state
        .ledger
        .get(expense_id)
        .await?
        .ok_or_else(|| AppError::NotFound("expense not found".to_string()))?;
    let response = ApiResponse {
        data: ExpenseResponse::from(record),
        message: "Receipt attached successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}
