//! # UI Labels
//!
//! Built-in translation dictionaries and key lookup with fallback.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Label Resolution                                 │
//! │                                                                         │
//! │   get("button.post")                                                    │
//! │        │                                                                │
//! │        ├── requested language ("fr")   found? → "Valider"               │
//! │        ├── default language ("en")     found? → "Post"                  │
//! │        └── the key itself              → "button.post"                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The dictionaries below are seeded into the `labels` table on first run;
//! texts edited in the database win over these built-ins afterwards.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::DEFAULT_LANGUAGE;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Language {
    /// ISO 639-1 code, e.g. "en".
    pub code: String,
    pub name: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Label {
    pub language_code: String,
    pub key: String,
    pub text: String,
}

/// Languages shipped with the application: `(code, name)`.
pub fn builtin_languages() -> &'static [(&'static str, &'static str)] {
    &[("en", "English"), ("es", "Español"), ("fr", "Français")]
}

/// Built-in `(key, text)` pairs for `code`. Empty for unknown languages.
pub fn builtin_labels(code: &str) -> &'static [(&'static str, &'static str)] {
    match code {
        "en" => EN,
        "es" => ES,
        "fr" => FR,
        _ => &[],
    }
}

// =============================================================================
// Label Set
// =============================================================================

/// Labels of one language, with the default language behind it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSet {
    pub language: String,
    labels: HashMap<String, String>,
    fallback: HashMap<String, String>,
}

impl LabelSet {
    pub fn new(
        language: impl Into<String>,
        labels: impl IntoIterator<Item = (String, String)>,
        fallback: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        LabelSet {
            language: language.into(),
            labels: labels.into_iter().collect(),
            fallback: fallback.into_iter().collect(),
        }
    }

    /// A set built only from the compiled-in dictionaries.
    pub fn builtin(language: &str) -> Self {
        let to_owned = |pairs: &'static [(&'static str, &'static str)]| {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Vec<_>>()
        };
        LabelSet::new(
            language,
            to_owned(builtin_labels(language)),
            to_owned(builtin_labels(DEFAULT_LANGUAGE)),
        )
    }

    /// Resolves `key`, falling back to the default language and then to
    /// the key itself.
    pub fn get<'a>(&'a self, key: &'a str) -> &'a str {
        self.labels
            .get(key)
            .or_else(|| self.fallback.get(key))
            .map(String::as_str)
            .unwrap_or(key)
    }

    /// Whether the requested language itself defines `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.labels.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// All resolved labels, requested language over fallback.
    pub fn resolved(&self) -> HashMap<String, String> {
        let mut out = self.fallback.clone();
        out.extend(self.labels.iter().map(|(k, v)| (k.clone(), v.clone())));
        out
    }
}

// =============================================================================
// Dictionaries
// =============================================================================

const EN: &[(&str, &str)] = &[
    ("app.title", "Tillstone POS"),
    ("menu.sales", "Sales"),
    ("menu.products", "Products"),
    ("menu.inventory", "Inventory"),
    ("menu.suppliers", "Suppliers"),
    ("menu.customers", "Customers"),
    ("menu.purchasing", "Purchasing"),
    ("menu.reports", "Reports"),
    ("menu.settings", "Settings"),
    ("menu.users", "Users"),
    ("menu.languages", "Languages"),
    ("menu.logout", "Log out"),
    ("field.sku", "SKU"),
    ("field.barcode", "Barcode"),
    ("field.name", "Name"),
    ("field.description", "Description"),
    ("field.category", "Category"),
    ("field.brand", "Brand"),
    ("field.unit", "Unit"),
    ("field.price", "Price"),
    ("field.cost", "Cost"),
    ("field.tax_rate", "Tax rate"),
    ("field.quantity", "Quantity"),
    ("field.free_quantity", "Free quantity"),
    ("field.discount", "Discount"),
    ("field.subtotal", "Subtotal"),
    ("field.tax", "Tax"),
    ("field.total", "Total"),
    ("field.tendered", "Tendered"),
    ("field.change", "Change"),
    ("field.batch_number", "Batch number"),
    ("field.expiry_date", "Expiry date"),
    ("field.location", "Location"),
    ("field.supplier", "Supplier"),
    ("field.customer", "Customer"),
    ("field.invoice_number", "Invoice number"),
    ("field.reason", "Reason"),
    ("field.notes", "Notes"),
    ("field.phone", "Phone"),
    ("field.email", "Email"),
    ("field.address", "Address"),
    ("field.username", "Username"),
    ("field.password", "Password"),
    ("field.reorder_level", "Reorder level"),
    ("field.loyalty_points", "Loyalty points"),
    ("button.save", "Save"),
    ("button.cancel", "Cancel"),
    ("button.delete", "Delete"),
    ("button.restore", "Restore"),
    ("button.search", "Search"),
    ("button.add", "Add"),
    ("button.remove", "Remove"),
    ("button.clear", "Clear"),
    ("button.post", "Post"),
    ("button.pay", "Pay"),
    ("button.checkout", "Checkout"),
    ("button.void", "Void"),
    ("button.refund", "Refund"),
    ("button.exchange", "Exchange"),
    ("button.print", "Print"),
    ("button.login", "Log in"),
    ("document.grn", "Goods Received Note"),
    ("document.goods_return", "Goods Return"),
    ("document.goods_replace", "Goods Replace"),
    ("document.adjustment", "Stock Adjustment"),
    ("document.transfer", "Stock Transfer"),
    ("status.pending", "Pending"),
    ("status.posted", "Posted"),
    ("status.cancelled", "Cancelled"),
    ("status.draft", "Draft"),
    ("status.completed", "Completed"),
    ("status.voided", "Voided"),
    ("payment.cash", "Cash"),
    ("payment.card", "Card"),
    ("payment.voucher", "Voucher"),
    ("payment.store_credit", "Store credit"),
    ("message.saved", "Saved successfully"),
    ("message.deleted", "Deleted successfully"),
    ("message.confirm_delete", "Are you sure you want to delete this record?"),
    ("message.confirm_post", "Posting will update stock. Continue?"),
    ("message.insufficient_stock", "Insufficient stock"),
    ("message.not_found", "Record not found"),
    ("message.required", "This field is required"),
    ("message.invalid_login", "Invalid username or password"),
    ("message.thank_you", "Thank you for shopping with us"),
    ("report.daily_summary", "Daily Summary"),
    ("report.stock_valuation", "Stock Valuation"),
    ("report.low_stock", "Low Stock"),
];

const ES: &[(&str, &str)] = &[
    ("app.title", "Tillstone POS"),
    ("menu.sales", "Ventas"),
    ("menu.products", "Productos"),
    ("menu.inventory", "Inventario"),
    ("menu.suppliers", "Proveedores"),
    ("menu.customers", "Clientes"),
    ("menu.purchasing", "Compras"),
    ("menu.reports", "Informes"),
    ("menu.settings", "Configuración"),
    ("menu.users", "Usuarios"),
    ("menu.languages", "Idiomas"),
    ("menu.logout", "Cerrar sesión"),
    ("field.sku", "SKU"),
    ("field.barcode", "Código de barras"),
    ("field.name", "Nombre"),
    ("field.description", "Descripción"),
    ("field.category", "Categoría"),
    ("field.brand", "Marca"),
    ("field.unit", "Unidad"),
    ("field.price", "Precio"),
    ("field.cost", "Costo"),
    ("field.tax_rate", "Tasa de impuesto"),
    ("field.quantity", "Cantidad"),
    ("field.free_quantity", "Cantidad gratuita"),
    ("field.discount", "Descuento"),
    ("field.subtotal", "Subtotal"),
    ("field.tax", "Impuesto"),
    ("field.total", "Total"),
    ("field.tendered", "Entregado"),
    ("field.change", "Cambio"),
    ("field.batch_number", "Número de lote"),
    ("field.expiry_date", "Fecha de caducidad"),
    ("field.location", "Ubicación"),
    ("field.supplier", "Proveedor"),
    ("field.customer", "Cliente"),
    ("field.invoice_number", "Número de factura"),
    ("field.reason", "Motivo"),
    ("field.notes", "Notas"),
    ("field.phone", "Teléfono"),
    ("field.email", "Correo electrónico"),
    ("field.address", "Dirección"),
    ("field.username", "Usuario"),
    ("field.password", "Contraseña"),
    ("field.reorder_level", "Nivel de reposición"),
    ("field.loyalty_points", "Puntos de fidelidad"),
    ("button.save", "Guardar"),
    ("button.cancel", "Cancelar"),
    ("button.delete", "Eliminar"),
    ("button.restore", "Restaurar"),
    ("button.search", "Buscar"),
    ("button.add", "Agregar"),
    ("button.remove", "Quitar"),
    ("button.clear", "Limpiar"),
    ("button.post", "Contabilizar"),
    ("button.pay", "Pagar"),
    ("button.checkout", "Cobrar"),
    ("button.void", "Anular"),
    ("button.refund", "Reembolsar"),
    ("button.exchange", "Cambiar"),
    ("button.print", "Imprimir"),
    ("button.login", "Iniciar sesión"),
    ("document.grn", "Nota de recepción"),
    ("document.goods_return", "Devolución a proveedor"),
    ("document.goods_replace", "Reposición de proveedor"),
    ("document.adjustment", "Ajuste de existencias"),
    ("document.transfer", "Traslado de existencias"),
    ("status.pending", "Pendiente"),
    ("status.posted", "Contabilizado"),
    ("status.cancelled", "Cancelado"),
    ("status.draft", "Borrador"),
    ("status.completed", "Completada"),
    ("status.voided", "Anulada"),
    ("payment.cash", "Efectivo"),
    ("payment.card", "Tarjeta"),
    ("payment.voucher", "Vale"),
    ("payment.store_credit", "Crédito de tienda"),
    ("message.saved", "Guardado correctamente"),
    ("message.deleted", "Eliminado correctamente"),
    ("message.confirm_delete", "¿Seguro que desea eliminar este registro?"),
    ("message.confirm_post", "Contabilizar actualizará las existencias. ¿Continuar?"),
    ("message.insufficient_stock", "Existencias insuficientes"),
    ("message.not_found", "Registro no encontrado"),
    ("message.required", "Este campo es obligatorio"),
    ("message.invalid_login", "Usuario o contraseña incorrectos"),
    ("message.thank_you", "Gracias por su compra"),
    ("report.daily_summary", "Resumen diario"),
    ("report.stock_valuation", "Valoración de existencias"),
    ("report.low_stock", "Existencias bajas"),
];

const FR: &[(&str, &str)] = &[
    ("app.title", "Tillstone POS"),
    ("menu.sales", "Ventes"),
    ("menu.products", "Produits"),
    ("menu.inventory", "Stock"),
    ("menu.suppliers", "Fournisseurs"),
    ("menu.customers", "Clients"),
    ("menu.purchasing", "Achats"),
    ("menu.reports", "Rapports"),
    ("menu.settings", "Paramètres"),
    ("menu.users", "Utilisateurs"),
    ("menu.languages", "Langues"),
    ("menu.logout", "Se déconnecter"),
    ("field.sku", "Référence"),
    ("field.barcode", "Code-barres"),
    ("field.name", "Nom"),
    ("field.description", "Description"),
    ("field.category", "Catégorie"),
    ("field.brand", "Marque"),
    ("field.unit", "Unité"),
    ("field.price", "Prix"),
    ("field.cost", "Coût"),
    ("field.tax_rate", "Taux de taxe"),
    ("field.quantity", "Quantité"),
    ("field.free_quantity", "Quantité gratuite"),
    ("field.discount", "Remise"),
    ("field.subtotal", "Sous-total"),
    ("field.tax", "Taxe"),
    ("field.total", "Total"),
    ("field.tendered", "Montant remis"),
    ("field.change", "Monnaie"),
    ("field.batch_number", "Numéro de lot"),
    ("field.expiry_date", "Date de péremption"),
    ("field.location", "Emplacement"),
    ("field.supplier", "Fournisseur"),
    ("field.customer", "Client"),
    ("field.invoice_number", "Numéro de facture"),
    ("field.reason", "Motif"),
    ("field.notes", "Notes"),
    ("field.phone", "Téléphone"),
    ("field.email", "E-mail"),
    ("field.address", "Adresse"),
    ("field.username", "Nom d'utilisateur"),
    ("field.password", "Mot de passe"),
    ("field.reorder_level", "Seuil de réapprovisionnement"),
    ("field.loyalty_points", "Points de fidélité"),
    ("button.save", "Enregistrer"),
    ("button.cancel", "Annuler"),
    ("button.delete", "Supprimer"),
    ("button.restore", "Restaurer"),
    ("button.search", "Rechercher"),
    ("button.add", "Ajouter"),
    ("button.remove", "Retirer"),
    ("button.clear", "Vider"),
    ("button.post", "Valider"),
    ("button.pay", "Payer"),
    ("button.checkout", "Encaisser"),
    ("button.void", "Annuler la vente"),
    ("button.refund", "Rembourser"),
    ("button.exchange", "Échanger"),
    ("button.print", "Imprimer"),
    ("button.login", "Se connecter"),
    ("document.grn", "Bon de réception"),
    ("document.goods_return", "Retour fournisseur"),
    ("document.goods_replace", "Remplacement fournisseur"),
    ("document.adjustment", "Ajustement de stock"),
    ("document.transfer", "Transfert de stock"),
    ("status.pending", "En attente"),
    ("status.posted", "Validé"),
    ("status.cancelled", "Annulé"),
    ("status.draft", "Brouillon"),
    ("status.completed", "Terminée"),
    ("status.voided", "Annulée"),
    ("payment.cash", "Espèces"),
    ("payment.card", "Carte"),
    ("payment.voucher", "Bon d'achat"),
    ("payment.store_credit", "Avoir"),
    ("message.saved", "Enregistré avec succès"),
    ("message.deleted", "Supprimé avec succès"),
    ("message.confirm_delete", "Voulez-vous vraiment supprimer cet enregistrement ?"),
    ("message.confirm_post", "La validation mettra à jour le stock. Continuer ?"),
    ("message.insufficient_stock", "Stock insuffisant"),
    ("message.not_found", "Enregistrement introuvable"),
    ("message.required", "Ce champ est obligatoire"),
    ("message.invalid_login", "Nom d'utilisateur ou mot de passe incorrect"),
    ("message.thank_you", "Merci de votre visite"),
    ("report.daily_summary", "Résumé journalier"),
    ("report.stock_valuation", "Valorisation du stock"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_language_is_builtin() {
        assert!(builtin_languages().iter().any(|(c, _)| *c == DEFAULT_LANGUAGE));
    }

    #[test]
    fn test_translations_use_known_keys() {
        let english: HashSet<_> = builtin_labels("en").iter().map(|(k, _)| *k).collect();
        for (code, _) in builtin_languages() {
            for (key, _) in builtin_labels(code) {
                assert!(english.contains(key), "{code} defines unknown key {key}");
            }
        }
    }

    #[test]
    fn test_fallback_chain() {
        let fr = LabelSet::builtin("fr");
        assert_eq!(fr.get("button.post"), "Valider");
        // Missing in French, present in English
        assert_eq!(fr.get("report.low_stock"), "Low Stock");
        assert_eq!(fr.get("no.such.key"), "no.such.key");
    }

    #[test]
    fn test_unknown_language_uses_default() {
        let de = LabelSet::builtin("de");
        assert!(de.is_empty());
        assert_eq!(de.get("menu.sales"), "Sales");
    }

    #[test]
    fn test_resolved_prefers_requested_language() {
        let es = LabelSet::builtin("es").resolved();
        assert_eq!(es.get("button.save").map(String::as_str), Some("Guardar"));
        assert_eq!(es.len(), builtin_labels("en").len());
    }
}
