//! The product form shared by the add and edit pages.

use axum::extract::{Multipart, multipart::Field};
use maud::{Markup, html};

use crate::{
    Error,
    html::{FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, field_error, submit_button},
    product::{ProductFormData, ProductFormErrors, ProductId, UploadedImage},
};

/// Read the product form fields from a multipart body.
///
/// An empty file input is treated as no image.
pub async fn parse_product_form(mut multipart: Multipart) -> Result<ProductFormData, Error> {
    let mut form = ProductFormData::default();

    while let Some(field) = multipart.next_field().await.map_err(|error| {
        tracing::error!("Could not read multipart form field: {error}");
        Error::MultipartError(error.body_text())
    })? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        match name.as_str() {
            "product_id" => form.product_id = Some(read_text(field).await?),
            "title" => form.title = read_text(field).await?,
            "price" => form.price = read_text(field).await?,
            "description" => form.description = read_text(field).await?,
            "image" => form.image = read_image(field).await?,
            other => tracing::debug!("Ignoring unexpected product form field {other}"),
        }
    }

    Ok(form)
}

async fn read_text(field: Field<'_>) -> Result<String, Error> {
    field.text().await.map_err(|error| {
        tracing::error!("Could not read data from multipart form field: {error}");
        Error::MultipartError("Could not read data from multipart form field.".to_owned())
    })
}

async fn read_image(field: Field<'_>) -> Result<Option<UploadedImage>, Error> {
    let file_name = field.file_name().unwrap_or_default().to_owned();
    let content_type = field.content_type().unwrap_or_default().to_owned();

    let bytes = field.bytes().await.map_err(|error| {
        tracing::error!("Could not read file from multipart form field: {error}");
        Error::MultipartError("Could not read file from multipart form field.".to_owned())
    })?;

    if file_name.is_empty() && bytes.is_empty() {
        return Ok(None);
    }

    tracing::debug!("Received file '{}' that is {} bytes", file_name, bytes.len());

    Ok(Some(UploadedImage {
        file_name,
        content_type,
        bytes: bytes.to_vec(),
    }))
}

/// Render the product form.
///
/// `product_id` is set when editing, which adds it as a hidden field and makes
/// the image optional.
pub fn product_form_view(
    action: &str,
    product_id: Option<ProductId>,
    values: &ProductFormData,
    errors: &ProductFormErrors,
) -> Markup {
    let is_editing = product_id.is_some();

    html! {
        form
            hx-post=(action)
            hx-encoding="multipart/form-data"
            hx-target-422="this"
            hx-target-error="#alert-container"
            hx-swap="outerHTML"
            hx-indicator="#indicator"
            class="w-full space-y-4 md:space-y-6"
        {
            @if let Some(product_id) = product_id {
                input type="hidden" name="product_id" value=(product_id);
            }

            div
            {
                label for="title" class=(FORM_LABEL_STYLE) { "Title" }

                input
                    id="title"
                    type="text"
                    name="title"
                    value=(values.title)
                    required
                    autofocus
                    class=(FORM_TEXT_INPUT_STYLE);

                (field_error(errors.title.as_deref()))
            }

            div
            {
                label for="image" class=(FORM_LABEL_STYLE) { "Image" }

                input
                    id="image"
                    type="file"
                    name="image"
                    accept="image/png, image/jpeg"
                    required[!is_editing]
                    class=(FORM_TEXT_INPUT_STYLE);

                (field_error(errors.image.as_deref()))
            }

            div
            {
                label for="price" class=(FORM_LABEL_STYLE) { "Price" }

                input
                    id="price"
                    type="number"
                    name="price"
                    step="0.01"
                    min="0"
                    value=(values.price)
                    required
                    class=(FORM_TEXT_INPUT_STYLE);

                (field_error(errors.price.as_deref()))
            }

            div
            {
                label for="description" class=(FORM_LABEL_STYLE) { "Description" }

                textarea
                    id="description"
                    name="description"
                    rows="5"
                    required
                    class=(FORM_TEXT_INPUT_STYLE)
                {
                    (values.description)
                }

                (field_error(errors.description.as_deref()))
            }

            (submit_button(if is_editing { "Update Product" } else { "Add Product" }))
        }
    }
}
