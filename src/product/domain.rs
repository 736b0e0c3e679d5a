//! Core product domain types and form validation.

use serde::{Deserialize, Serialize};

use crate::{Error, auth::UserID, endpoints};

/// Database identifier for a product.
pub type ProductId = i64;

/// An item for sale, listed by the user that created it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub price: f64,
    pub description: String,
    /// The file name of the product image inside the image directory.
    pub image_path: String,
    /// The user that created the product.
    pub user_id: UserID,
}

impl Product {
    /// The URL the product image is served from.
    pub fn image_url(&self) -> String {
        format!("{}/{}", endpoints::IMAGES, self.image_path)
    }

    /// Whether `user_id` is allowed to edit or delete this product.
    pub fn is_owned_by(&self, user_id: UserID) -> bool {
        self.user_id == user_id
    }
}

/// The fields of a product that a user can edit.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDetails {
    pub title: String,
    pub price: f64,
    pub description: String,
}

/// An image uploaded with the product form.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

const IMAGE_CONTENT_TYPES: [&str; 3] = ["image/png", "image/jpg", "image/jpeg"];

impl UploadedImage {
    pub fn is_image(&self) -> bool {
        IMAGE_CONTENT_TYPES.contains(&self.content_type.as_str())
    }
}

/// The raw values submitted in the product form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFormData {
    /// Only set when editing an existing product.
    pub product_id: Option<String>,
    pub title: String,
    pub price: String,
    pub description: String,
    pub image: Option<UploadedImage>,
}

/// The validation message for each field of the product form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFormErrors {
    pub title: Option<String>,
    pub price: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl ProductFormErrors {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.price.is_none()
            && self.description.is_none()
            && self.image.is_none()
    }
}

impl ProductFormData {
    /// Check every field, collecting a message for each invalid one.
    ///
    /// The image must be present when `image_required` is set. When present it
    /// must be a PNG or JPEG.
    ///
    /// # Errors
    ///
    /// Returns the messages for all invalid fields if any field is invalid.
    pub fn validate(&self, image_required: bool) -> Result<ProductDetails, ProductFormErrors> {
        let mut errors = ProductFormErrors::default();

        let title = self.title.trim();
        if title.is_empty() {
            errors.title = Some(Error::EmptyTitle.to_string());
        }

        let price = parse_price(&self.price);
        if price.is_none() {
            errors.price = Some(Error::InvalidPrice.to_string());
        }

        let description = self.description.trim();
        if description.is_empty() {
            errors.description = Some(Error::EmptyDescription.to_string());
        }

        match &self.image {
            Some(image) if !image.is_image() => {
                errors.image = Some(Error::NotAnImage.to_string());
            }
            None if image_required => {
                errors.image = Some(Error::NotAnImage.to_string());
            }
            _ => {}
        }

        match price {
            Some(price) if errors.is_empty() => Ok(ProductDetails {
                title: title.to_owned(),
                price,
                description: description.to_owned(),
            }),
            _ => Err(errors),
        }
    }
}

fn parse_price(raw_price: &str) -> Option<f64> {
    raw_price
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|price| price.is_finite() && *price >= 0.0)
}
