//! # Tillstone Entry Point
//!
//! Parses the command line, builds the application state and runs exactly
//! one command. Results are printed to stdout as JSON; logs go to stderr.
//!
//! ```text
//! tillstone [--config FILE] [--user NAME] <group> <action> [args]
//!
//!   product   search | get | create | update | delete | restore
//!   catalog   category | brand | unit | location
//!   supplier / customer   create | search | get | delete
//!   cart      show | add | qty | discount | cart-discount | customer | remove | clear
//!   sale      checkout [--pay METHOD[:AMOUNT]]... | pay | finalize | receipt | void | get
//!   refund / exchange     against a sale, by item id or SKU
//!   grn / goods-return / goods-replace   create | get | list | post | cancel
//!   stock     adjust | transfer | levels | movements | batches | expiring
//!   label     languages | add-language | default | list | set | show | seed
//!   user      create | login | passwd | role | list | delete
//!   report    daily | valuation | low-stock
//!   config
//! ```
//!
//! Document lines are given as colon-separated `--line` specs, e.g.
//! `--line COKE-330:B-7:24:45:2027-03-01` on a GRN.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tillstone_db::{NewCustomer, NewSupplier};

use tillstone_cli::commands::{
    cart, catalog, config as config_cmd, goods, label, party, product, refund, report, sale,
    stock, user,
};
use tillstone_cli::config::AppConfig;
use tillstone_cli::error::{ApiError, ApiResult};
use tillstone_cli::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "tillstone", version, about = "Tillstone point of sale")]
struct CommandLine {
    /// Configuration file (default: ./tillstone.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Username recorded on every write
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Products
    #[command(subcommand)]
    Product(ProductCommand),
    /// Categories, brands, units and locations
    #[command(subcommand)]
    Catalog(CatalogCommand),
    #[command(subcommand)]
    Supplier(PartyCommand),
    #[command(subcommand)]
    Customer(PartyCommand),
    /// The open cart on this terminal
    #[command(subcommand)]
    Cart(CartCommand),
    #[command(subcommand)]
    Sale(SaleCommand),
    /// Refund sold items
    Refund(RefundArgs),
    /// Return sold items and sell the current cart in their place
    Exchange(ExchangeArgs),
    /// Goods received notes
    #[command(subcommand)]
    Grn(GrnCommand),
    /// Goods returned to a supplier
    #[command(subcommand)]
    GoodsReturn(GoodsReturnCommand),
    /// Supplier replacements for returned goods
    #[command(subcommand)]
    GoodsReplace(GoodsReplaceCommand),
    #[command(subcommand)]
    Stock(StockCommand),
    /// Languages and display labels
    #[command(subcommand)]
    Label(LabelCommand),
    #[command(subcommand)]
    User(UserCommand),
    #[command(subcommand)]
    Report(ReportCommand),
    /// Effective configuration and database status
    #[command(subcommand)]
    Config(ConfigCommand),
}

// =============================================================================
// Products and master data
// =============================================================================

#[derive(Debug, Subcommand)]
enum ProductCommand {
    Search {
        query: String,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Look up by id, SKU or barcode
    Get { key: String },
    Create(CreateProductArgs),
    Update(UpdateProductArgs),
    Delete { key: String },
    Restore { key: String },
}

#[derive(Debug, Args)]
struct CreateProductArgs {
    #[arg(long)]
    sku: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    price: i64,
    #[arg(long, default_value_t = 0)]
    cost: i64,
    #[arg(long)]
    barcode: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    brand: Option<String>,
    #[arg(long)]
    unit: Option<String>,
    /// Tax rate in basis points (1500 = 15%)
    #[arg(long)]
    tax_bps: Option<u32>,
    #[arg(long)]
    untracked: bool,
    #[arg(long)]
    allow_negative: Option<bool>,
    #[arg(long)]
    reorder_level: Option<i64>,
    #[arg(long)]
    opening_stock: Option<i64>,
    #[arg(long)]
    batch: Option<String>,
    #[arg(long)]
    expiry: Option<String>,
}

#[derive(Debug, Args)]
struct UpdateProductArgs {
    key: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    barcode: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    brand: Option<String>,
    #[arg(long)]
    unit: Option<String>,
    #[arg(long)]
    price: Option<i64>,
    #[arg(long)]
    cost: Option<i64>,
    #[arg(long)]
    tax_bps: Option<u32>,
    #[arg(long)]
    track_inventory: Option<bool>,
    #[arg(long)]
    allow_negative: Option<bool>,
    #[arg(long)]
    reorder_level: Option<i64>,
}

#[derive(Debug, Subcommand)]
enum CatalogCommand {
    #[command(subcommand)]
    Category(CatalogAction),
    #[command(subcommand)]
    Brand(CatalogAction),
    #[command(subcommand)]
    Unit(CatalogAction),
    #[command(subcommand)]
    Location(CatalogAction),
}

#[derive(Debug, Subcommand)]
enum CatalogAction {
    Create {
        name: String,
        /// Unit symbol, location code or parent category id
        #[arg(long)]
        extra: Option<String>,
    },
    List {
        #[arg(long)]
        all: bool,
    },
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
enum PartyCommand {
    Create {
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        contact: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    Search {
        query: String,
        #[arg(long)]
        limit: Option<u32>,
    },
    Get { key: String },
    Delete { key: String },
}

// =============================================================================
// Till
// =============================================================================

#[derive(Debug, Subcommand)]
enum CartCommand {
    Show,
    Add {
        product: String,
        #[arg(long)]
        qty: Option<i64>,
    },
    /// Set a line's quantity; 0 removes it
    Qty { product: String, quantity: i64 },
    /// Line discount in cents
    Discount { product: String, cents: i64 },
    /// Whole-cart discount in basis points
    CartDiscount { bps: u32 },
    /// Book the cart to a customer, or clear it with no argument
    Customer { customer: Option<String> },
    Remove { product: String },
    Clear,
}

#[derive(Debug, Subcommand)]
enum SaleCommand {
    /// Turn the cart into a sale; with --pay, also take payment and finish
    Checkout {
        /// METHOD[:AMOUNT] in cents, repeatable
        #[arg(long = "pay")]
        payments: Vec<String>,
    },
    Pay {
        sale: String,
        method: String,
        #[arg(long)]
        amount: Option<i64>,
        #[arg(long)]
        tendered: Option<i64>,
        #[arg(long)]
        reference: Option<String>,
    },
    Finalize { sale: String },
    Receipt { sale: String },
    Void { sale: String },
    Get { sale: String },
    /// Refunds issued against a sale
    Refunds { sale: String },
    /// Sales created between two days (default today)
    List {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    /// An exchange with its refund and replacement sale
    Exchange { id: String },
}

#[derive(Debug, Args)]
struct RefundArgs {
    /// Sale id or receipt number
    sale: String,
    /// ITEM:QTY where ITEM is a sale item id or SKU
    #[arg(long = "line", required = true)]
    lines: Vec<String>,
    #[arg(long)]
    reason: Option<String>,
    #[arg(long, default_value = "cash")]
    method: String,
    /// Do not put the goods back into stock
    #[arg(long)]
    no_restock: bool,
}

#[derive(Debug, Args)]
struct ExchangeArgs {
    sale: String,
    #[arg(long = "line", required = true)]
    lines: Vec<String>,
    #[arg(long)]
    reason: Option<String>,
    /// How a positive balance is paid
    #[arg(long, default_value = "cash")]
    method: String,
    #[arg(long)]
    tendered: Option<i64>,
    #[arg(long)]
    no_restock: bool,
}

// =============================================================================
// Supplier documents and stock
// =============================================================================

#[derive(Debug, Subcommand)]
enum GrnCommand {
    Create {
        #[arg(long)]
        supplier: String,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        invoice: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// PRODUCT:BATCH:QTY:UNIT_COST[:EXPIRY[:FREE_QTY]]
        #[arg(long = "line")]
        lines: Vec<String>,
    },
    AddLine { grn: String, line: String },
    RemoveLine { grn: String, item_id: String },
    Get { grn: String },
    List {
        #[arg(long)]
        status: Option<String>,
    },
    Post { grn: String },
    Cancel { grn: String },
}

#[derive(Debug, Subcommand)]
enum GoodsReturnCommand {
    Create {
        #[arg(long)]
        supplier: String,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        grn: Option<String>,
        #[arg(long)]
        reason: Option<String>,
        /// PRODUCT:QTY[:BATCH]
        #[arg(long = "line", required = true)]
        lines: Vec<String>,
    },
    Get { id: String },
    List {
        #[arg(long)]
        status: Option<String>,
    },
    Post { id: String },
    Cancel { id: String },
}

#[derive(Debug, Subcommand)]
enum GoodsReplaceCommand {
    Create {
        /// Posted goods return being replaced
        goods_return: String,
        #[arg(long)]
        notes: Option<String>,
        /// PRODUCT:BATCH:QTY:UNIT_COST[:EXPIRY]
        #[arg(long = "line", required = true)]
        lines: Vec<String>,
    },
    Get { id: String },
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        goods_return: Option<String>,
    },
    Post { id: String },
    Cancel { id: String },
}

#[derive(Debug, Subcommand)]
enum StockCommand {
    Adjust {
        /// damage, expiry, theft, count or other
        reason: String,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// PRODUCT:DELTA[:BATCH]
        #[arg(long = "line", required = true, allow_hyphen_values = true)]
        lines: Vec<String>,
    },
    Adjustments {
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    Adjustment { id: String },
    #[command(subcommand)]
    Transfer(TransferCommand),
    Levels {
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        product: Option<String>,
    },
    Movements {
        product: String,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Movements caused by one document: TYPE is sale, refund, grn, ...
    DocumentMovements { reference_type: String, reference_id: String },
    Batches {
        product: String,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        all: bool,
    },
    Expiring {
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
}

#[derive(Debug, Subcommand)]
enum TransferCommand {
    Create {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: String,
        #[arg(long)]
        notes: Option<String>,
        /// PRODUCT:QTY[:BATCH]
        #[arg(long = "line", required = true)]
        lines: Vec<String>,
    },
    Get { id: String },
    List {
        #[arg(long)]
        status: Option<String>,
    },
    Post { id: String },
    Cancel { id: String },
}

// =============================================================================
// Labels, users, reports
// =============================================================================

#[derive(Debug, Subcommand)]
enum LabelCommand {
    Languages,
    AddLanguage { code: String, name: String },
    Default { code: String },
    List { language: String },
    Set { language: String, key: String, text: String },
    /// Resolved labels after fallback
    Show { language: Option<String> },
    Seed,
}

#[derive(Debug, Subcommand)]
enum UserCommand {
    Create {
        username: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "cashier")]
        role: String,
        #[arg(long)]
        password: String,
    },
    Login {
        username: String,
        #[arg(long)]
        password: String,
    },
    Passwd {
        username: String,
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
    },
    Role { username: String, role: String },
    List {
        #[arg(long)]
        all: bool,
    },
    Delete { username: String },
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Settings after defaults, file and environment are merged
    Show,
    /// Terminal identity, database path and schema version
    Status,
}

#[derive(Debug, Subcommand)]
enum ReportCommand {
    Daily {
        #[arg(long)]
        date: Option<String>,
    },
    Valuation {
        #[arg(long)]
        location: Option<String>,
    },
    LowStock {
        #[arg(long)]
        location: Option<String>,
    },
}

// =============================================================================
// Entry
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    tillstone_cli::init_tracing();
    let cli = CommandLine::parse();

    match run(cli).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("{}", json(&err).unwrap_or_else(|_| err.to_string()));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: CommandLine) -> ApiResult<String> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let state = tillstone_cli::bootstrap(config).await?;

    let result = execute(state.clone(), cli.user, cli.command).await;
    state.database().close().await;
    result
}

async fn execute(mut state: AppState, operator: Option<String>, command: Command) -> ApiResult<String> {
    if let Some(username) = operator.as_deref() {
        let id = user::operator_id(&state, username).await?;
        state = state.with_user(id);
    }
    dispatch(&state, command).await
}

fn json<T: Serialize>(value: &T) -> ApiResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::internal(format!("Could not encode output: {}", e)))
}

async fn dispatch(state: &AppState, command: Command) -> ApiResult<String> {
    match command {
        Command::Product(cmd) => run_product(state, cmd).await,
        Command::Catalog(cmd) => run_catalog(state, cmd).await,
        Command::Supplier(cmd) => run_supplier(state, cmd).await,
        Command::Customer(cmd) => run_customer(state, cmd).await,
        Command::Cart(cmd) => run_cart(state, cmd).await,
        Command::Sale(cmd) => run_sale(state, cmd).await,
        Command::Refund(args) => json(
            &refund::refund_sale(
                state,
                refund::RefundSaleRequest {
                    sale: args.sale,
                    lines: return_lines(&args.lines, !args.no_restock)?,
                    reason: args.reason,
                    method: Some(args.method),
                },
            )
            .await?,
        ),
        Command::Exchange(args) => json(
            &refund::exchange_sale(
                state,
                refund::ExchangeSaleRequest {
                    sale: args.sale,
                    lines: return_lines(&args.lines, !args.no_restock)?,
                    reason: args.reason,
                    balance_method: Some(args.method),
                    tendered_cents: args.tendered,
                },
            )
            .await?,
        ),
        Command::Grn(cmd) => run_grn(state, cmd).await,
        Command::GoodsReturn(cmd) => run_goods_return(state, cmd).await,
        Command::GoodsReplace(cmd) => run_goods_replace(state, cmd).await,
        Command::Stock(cmd) => run_stock(state, cmd).await,
        Command::Label(cmd) => run_label(state, cmd).await,
        Command::User(cmd) => run_user(state, cmd).await,
        Command::Report(cmd) => run_report(state, cmd).await,
        Command::Config(ConfigCommand::Show) => json(&config_cmd::get_config(state).await?),
        Command::Config(ConfigCommand::Status) => json(&config_cmd::get_status(state).await?),
    }
}

async fn run_product(state: &AppState, cmd: ProductCommand) -> ApiResult<String> {
    match cmd {
        ProductCommand::Search { query, limit } => json(
            &product::search_products(state, product::SearchProductsRequest { query, limit }).await?,
        ),
        ProductCommand::Get { key } => json(&product::get_product(state, &key).await?),
        ProductCommand::Create(args) => json(
            &product::create_product(
                state,
                product::CreateProductRequest {
                    sku: args.sku,
                    name: args.name,
                    price_cents: args.price,
                    cost_cents: args.cost,
                    barcode: args.barcode,
                    description: args.description,
                    category_id: args.category,
                    brand_id: args.brand,
                    unit_id: args.unit,
                    tax_rate_bps: args.tax_bps,
                    track_inventory: Some(!args.untracked),
                    allow_negative_stock: args.allow_negative,
                    reorder_level: args.reorder_level,
                    opening_stock: args.opening_stock,
                    batch_number: args.batch,
                    expiry_date: args.expiry,
                },
            )
            .await?,
        ),
        ProductCommand::Update(args) => json(
            &product::update_product(
                state,
                product::UpdateProductRequest {
                    key: args.key,
                    name: args.name,
                    barcode: args.barcode,
                    description: args.description,
                    category_id: args.category,
                    brand_id: args.brand,
                    unit_id: args.unit,
                    price_cents: args.price,
                    cost_cents: args.cost,
                    tax_rate_bps: args.tax_bps,
                    track_inventory: args.track_inventory,
                    allow_negative_stock: args.allow_negative,
                    reorder_level: args.reorder_level,
                },
            )
            .await?,
        ),
        ProductCommand::Delete { key } => json(&product::delete_product(state, &key).await?),
        ProductCommand::Restore { key } => json(&product::restore_product(state, &key).await?),
    }
}

async fn run_catalog(state: &AppState, cmd: CatalogCommand) -> ApiResult<String> {
    match cmd {
        CatalogCommand::Category(action) => match action {
            CatalogAction::Create { name, extra } => json(
                &catalog::create_category(
                    state,
                    catalog::CreateCategoryRequest { name, parent_id: extra },
                )
                .await?,
            ),
            CatalogAction::List { all } => json(&catalog::list_categories(state, all).await?),
            CatalogAction::Delete { id } => json(&catalog::delete_category(state, &id).await?),
        },
        CatalogCommand::Brand(action) => match action {
            CatalogAction::Create { name, .. } => {
                json(&catalog::create_brand(state, catalog::CreateBrandRequest { name }).await?)
            }
            CatalogAction::List { all } => json(&catalog::list_brands(state, all).await?),
            CatalogAction::Delete { id } => json(&catalog::delete_brand(state, &id).await?),
        },
        CatalogCommand::Unit(action) => match action {
            CatalogAction::Create { name, extra } => {
                let symbol = extra.ok_or_else(|| ApiError::validation("--extra SYMBOL is required"))?;
                json(&catalog::create_unit(state, catalog::CreateUnitRequest { name, symbol }).await?)
            }
            CatalogAction::List { all } => json(&catalog::list_units(state, all).await?),
            CatalogAction::Delete { id } => json(&catalog::delete_unit(state, &id).await?),
        },
        CatalogCommand::Location(action) => match action {
            CatalogAction::Create { name, extra } => {
                let code = extra.ok_or_else(|| ApiError::validation("--extra CODE is required"))?;
                json(&catalog::create_location(state, catalog::CreateLocationRequest { code, name }).await?)
            }
            CatalogAction::List { all } => json(&catalog::list_locations(state, all).await?),
            CatalogAction::Delete { id } => json(&catalog::delete_location(state, &id).await?),
        },
    }
}

async fn run_supplier(state: &AppState, cmd: PartyCommand) -> ApiResult<String> {
    match cmd {
        PartyCommand::Create { code, name, contact, phone, email, address } => json(
            &party::create_supplier(
                state,
                NewSupplier {
                    code,
                    name,
                    contact_person: contact,
                    phone,
                    email,
                    address,
                },
            )
            .await?,
        ),
        PartyCommand::Search { query, limit } => json(
            &party::search_suppliers(state, party::SearchPartiesRequest { query, limit }).await?,
        ),
        PartyCommand::Get { key } => json(&party::get_supplier(state, &key).await?),
        PartyCommand::Delete { key } => json(&party::delete_supplier(state, &key).await?),
    }
}

async fn run_customer(state: &AppState, cmd: PartyCommand) -> ApiResult<String> {
    match cmd {
        PartyCommand::Create { code, name, phone, email, address, .. } => json(
            &party::create_customer(
                state,
                NewCustomer {
                    code,
                    name,
                    phone,
                    email,
                    address,
                },
            )
            .await?,
        ),
        PartyCommand::Search { query, limit } => json(
            &party::search_customers(state, party::SearchPartiesRequest { query, limit }).await?,
        ),
        PartyCommand::Get { key } => json(&party::get_customer(state, &key).await?),
        PartyCommand::Delete { key } => json(&party::delete_customer(state, &key).await?),
    }
}

async fn run_cart(state: &AppState, cmd: CartCommand) -> ApiResult<String> {
    let response = match cmd {
        CartCommand::Show => cart::get_cart(state).await?,
        CartCommand::Add { product, qty } => {
            cart::add_to_cart(state, cart::AddToCartRequest { product, quantity: qty }).await?
        }
        CartCommand::Qty { product, quantity } => {
            cart::update_cart_item(state, cart::UpdateCartItemRequest { product, quantity }).await?
        }
        CartCommand::Discount { product, cents } => {
            cart::set_line_discount(
                state,
                cart::LineDiscountRequest {
                    product,
                    discount_cents: cents,
                },
            )
            .await?
        }
        CartCommand::CartDiscount { bps } => cart::set_cart_discount(state, bps).await?,
        CartCommand::Customer { customer } => cart::set_cart_customer(state, customer.as_deref()).await?,
        CartCommand::Remove { product } => cart::remove_from_cart(state, &product).await?,
        CartCommand::Clear => cart::clear_cart(state).await?,
    };
    json(&response)
}

async fn run_sale(state: &AppState, cmd: SaleCommand) -> ApiResult<String> {
    match cmd {
        SaleCommand::Checkout { payments } => {
            let tenders = payments
                .iter()
                .map(|raw| payment_line(raw))
                .collect::<ApiResult<Vec<_>>>()?;

            let checkout = sale::checkout(state).await?;
            if tenders.is_empty() {
                return json(&checkout);
            }

            let sale_id = checkout.sale.id;
            for (method, amount) in tenders {
                sale::tender(state, &sale_id, &method, amount).await?;
            }
            json(&sale::finalize_sale(state, &sale_id).await?)
        }
        SaleCommand::Pay { sale: key, method, amount, tendered, reference } => json(
            &sale::add_payment(
                state,
                sale::AddPaymentRequest {
                    sale_id: key,
                    method,
                    amount_cents: amount,
                    tendered_cents: tendered,
                    reference,
                },
            )
            .await?,
        ),
        SaleCommand::Finalize { sale: key } => json(&sale::finalize_sale(state, &key).await?),
        SaleCommand::Receipt { sale: key } => json(&sale::get_receipt(state, &key).await?),
        SaleCommand::Void { sale: key } => json(&sale::void_sale(state, &key).await?),
        SaleCommand::Get { sale: key } => json(&sale::get_sale(state, &key).await?),
        SaleCommand::Refunds { sale: key } => json(&refund::refunds_for_sale(state, &key).await?),
        SaleCommand::List { from, to } => {
            json(&sale::list_sales(state, sale::ListSalesRequest { from, to }).await?)
        }
        SaleCommand::Exchange { id } => json(&refund::get_exchange(state, &id).await?),
    }
}

async fn run_grn(state: &AppState, cmd: GrnCommand) -> ApiResult<String> {
    match cmd {
        GrnCommand::Create { supplier, location, invoice, date, notes, lines } => json(
            &goods::create_grn(
                state,
                goods::CreateGrnRequest {
                    supplier,
                    location,
                    supplier_invoice: invoice,
                    received_date: date,
                    notes,
                    lines: lines.iter().map(|s| grn_line(s)).collect::<ApiResult<_>>()?,
                },
            )
            .await?,
        ),
        GrnCommand::AddLine { grn, line } => json(&goods::add_grn_item(state, &grn, grn_line(&line)?).await?),
        GrnCommand::RemoveLine { grn, item_id } => json(&goods::remove_grn_item(state, &grn, &item_id).await?),
        GrnCommand::Get { grn } => json(&goods::get_grn(state, &grn).await?),
        GrnCommand::List { status } => json(&goods::list_grns(state, status.as_deref()).await?),
        GrnCommand::Post { grn } => json(&goods::post_grn(state, &grn).await?),
        GrnCommand::Cancel { grn } => json(&goods::cancel_grn(state, &grn).await?),
    }
}

async fn run_goods_return(state: &AppState, cmd: GoodsReturnCommand) -> ApiResult<String> {
    match cmd {
        GoodsReturnCommand::Create { supplier, location, grn, reason, lines } => {
            let lines = lines
                .iter()
                .map(|raw| -> ApiResult<goods::ReturnToSupplierLine> {
                    let (product, quantity, batch) = quantity_line(raw)?;
                    Ok(goods::ReturnToSupplierLine {
                        product,
                        batch,
                        quantity,
                        unit_cost_cents: None,
                    })
                })
                .collect::<ApiResult<_>>()?;
            json(
                &goods::create_goods_return(
                    state,
                    goods::CreateGoodsReturnRequest { supplier, location, grn, reason, lines },
                )
                .await?,
            )
        }
        GoodsReturnCommand::Get { id } => json(&goods::get_goods_return(state, &id).await?),
        GoodsReturnCommand::List { status } => json(&goods::list_goods_returns(state, status.as_deref()).await?),
        GoodsReturnCommand::Post { id } => json(&goods::post_goods_return(state, &id).await?),
        GoodsReturnCommand::Cancel { id } => json(&goods::cancel_goods_return(state, &id).await?),
    }
}

async fn run_goods_replace(state: &AppState, cmd: GoodsReplaceCommand) -> ApiResult<String> {
    match cmd {
        GoodsReplaceCommand::Create { goods_return, notes, lines } => {
            let lines = lines
                .iter()
                .map(|raw| -> ApiResult<goods::ReplaceLineRequest> {
                    let line = grn_line(raw)?;
                    Ok(goods::ReplaceLineRequest {
                        product: line.product,
                        batch_number: line.batch_number,
                        expiry_date: line.expiry_date,
                        quantity: line.quantity,
                        unit_cost_cents: line.unit_cost_cents,
                    })
                })
                .collect::<ApiResult<_>>()?;
            json(
                &goods::create_goods_replace(
                    state,
                    goods::CreateGoodsReplaceRequest {
                        goods_return_id: goods_return,
                        notes,
                        lines,
                    },
                )
                .await?,
            )
        }
        GoodsReplaceCommand::Get { id } => json(&goods::get_goods_replace(state, &id).await?),
        GoodsReplaceCommand::List { status, goods_return } => json(
            &goods::list_goods_replaces(state, status.as_deref(), goods_return.as_deref()).await?,
        ),
        GoodsReplaceCommand::Post { id } => json(&goods::post_goods_replace(state, &id).await?),
        GoodsReplaceCommand::Cancel { id } => json(&goods::cancel_goods_replace(state, &id).await?),
    }
}

async fn run_stock(state: &AppState, cmd: StockCommand) -> ApiResult<String> {
    match cmd {
        StockCommand::Adjust { reason, location, notes, lines } => {
            let lines = lines
                .iter()
                .map(|raw| -> ApiResult<stock::AdjustmentLineRequest> {
                    let (product, delta, batch) = quantity_line(raw)?;
                    Ok(stock::AdjustmentLineRequest { product, batch, delta })
                })
                .collect::<ApiResult<_>>()?;
            json(
                &stock::adjust_stock(
                    state,
                    stock::AdjustStockRequest { location, reason, notes, lines },
                )
                .await?,
            )
        }
        StockCommand::Adjustments { location, limit } => {
            json(&stock::list_adjustments(state, location.as_deref(), limit).await?)
        }
        StockCommand::Adjustment { id } => json(&stock::get_adjustment(state, &id).await?),
        StockCommand::Transfer(cmd) => match cmd {
            TransferCommand::Create { from, to, notes, lines } => {
                let lines = lines
                    .iter()
                    .map(|raw| -> ApiResult<stock::TransferLineRequest> {
                        let (product, quantity, batch) = quantity_line(raw)?;
                        Ok(stock::TransferLineRequest { product, batch, quantity })
                    })
                    .collect::<ApiResult<_>>()?;
                json(
                    &stock::create_transfer(
                        state,
                        stock::CreateTransferRequest { from, to, notes, lines },
                    )
                    .await?,
                )
            }
            TransferCommand::Get { id } => json(&stock::get_transfer(state, &id).await?),
            TransferCommand::List { status } => json(&stock::list_transfers(state, status.as_deref()).await?),
            TransferCommand::Post { id } => json(&stock::post_transfer(state, &id).await?),
            TransferCommand::Cancel { id } => json(&stock::cancel_transfer(state, &id).await?),
        },
        StockCommand::Levels { location, product } => {
            json(&stock::stock_levels(state, location.as_deref(), product.as_deref()).await?)
        }
        StockCommand::Movements { product, location, limit } => {
            json(&stock::stock_movements(state, &product, location.as_deref(), limit).await?)
        }
        StockCommand::DocumentMovements { reference_type, reference_id } => {
            json(&stock::document_movements(state, &reference_type, &reference_id).await?)
        }
        StockCommand::Batches { product, location, all } => {
            json(&stock::product_batches(state, &product, location.as_deref(), all).await?)
        }
        StockCommand::Expiring { days } => json(&stock::expiring_batches(state, days).await?),
    }
}

async fn run_label(state: &AppState, cmd: LabelCommand) -> ApiResult<String> {
    match cmd {
        LabelCommand::Languages => json(&label::list_languages(state).await?),
        LabelCommand::AddLanguage { code, name } => {
            json(&label::add_language(state, label::AddLanguageRequest { code, name }).await?)
        }
        LabelCommand::Default { code } => json(&label::set_default_language(state, &code).await?),
        LabelCommand::List { language } => json(&label::list_labels(state, &language).await?),
        LabelCommand::Set { language, key, text } => {
            json(&label::set_label(state, label::SetLabelRequest { language, key, text }).await?)
        }
        LabelCommand::Show { language } => json(&label::label_set(state, language.as_deref()).await?),
        LabelCommand::Seed => json(&label::seed_labels(state).await?),
    }
}

async fn run_user(state: &AppState, cmd: UserCommand) -> ApiResult<String> {
    match cmd {
        UserCommand::Create { username, name, role, password } => json(
            &user::create_user(
                state,
                user::CreateUserRequest {
                    username,
                    display_name: name,
                    role,
                    password,
                },
            )
            .await?,
        ),
        UserCommand::Login { username, password } => {
            json(&user::login(state, user::LoginRequest { username, password }).await?)
        }
        UserCommand::Passwd { username, current, new } => json(
            &user::change_password(
                state,
                user::ChangePasswordRequest {
                    username,
                    current_password: current,
                    new_password: new,
                },
            )
            .await?,
        ),
        UserCommand::Role { username, role } => json(&user::set_user_role(state, &username, &role).await?),
        UserCommand::List { all } => json(&user::list_users(state, all).await?),
        UserCommand::Delete { username } => json(&user::delete_user(state, &username).await?),
    }
}

async fn run_report(state: &AppState, cmd: ReportCommand) -> ApiResult<String> {
    match cmd {
        ReportCommand::Daily { date } => {
            json(&report::daily_report(state, report::DailyReportRequest { date }).await?)
        }
        ReportCommand::Valuation { location } => json(&report::stock_valuation(state, location.as_deref()).await?),
        ReportCommand::LowStock { location } => json(&report::low_stock(state, location.as_deref()).await?),
    }
}

// =============================================================================
// Line specs
// =============================================================================

fn fields(raw: &str, min: usize, max: usize, shape: &str) -> ApiResult<Vec<String>> {
    let parts: Vec<String> = raw.split(':').map(|p| p.trim().to_string()).collect();
    if parts.len() < min || parts.len() > max || parts.iter().take(min).any(|p| p.is_empty()) {
        return Err(ApiError::validation(format!("Line '{}' must look like {}", raw, shape)));
    }
    Ok(parts)
}

fn number(raw: &str, value: &str) -> ApiResult<i64> {
    value
        .parse()
        .map_err(|_| ApiError::validation(format!("Line '{}': '{}' is not a whole number", raw, value)))
}

fn optional(parts: &[String], index: usize) -> Option<String> {
    parts.get(index).filter(|p| !p.is_empty()).cloned()
}

/// `PRODUCT:QTY[:BATCH]`
fn quantity_line(raw: &str) -> ApiResult<(String, i64, Option<String>)> {
    let parts = fields(raw, 2, 3, "PRODUCT:QTY[:BATCH]")?;
    Ok((parts[0].clone(), number(raw, &parts[1])?, optional(&parts, 2)))
}

/// `PRODUCT:BATCH:QTY:UNIT_COST[:EXPIRY[:FREE_QTY]]`
fn grn_line(raw: &str) -> ApiResult<goods::GrnLineRequest> {
    let parts = fields(raw, 4, 6, "PRODUCT:BATCH:QTY:UNIT_COST[:EXPIRY[:FREE_QTY]]")?;
    Ok(goods::GrnLineRequest {
        product: parts[0].clone(),
        batch_number: parts[1].clone(),
        quantity: number(raw, &parts[2])?,
        unit_cost_cents: number(raw, &parts[3])?,
        expiry_date: optional(&parts, 4),
        free_quantity: optional(&parts, 5).map(|q| number(raw, &q)).transpose()?.unwrap_or(0),
        discount_cents: 0,
    })
}

/// `ITEM:QTY` for refunds and exchanges.
fn return_lines(specs: &[String], restock: bool) -> ApiResult<Vec<refund::ReturnLineRequest>> {
    specs
        .iter()
        .map(|raw| -> ApiResult<refund::ReturnLineRequest> {
            let parts = fields(raw, 2, 2, "ITEM:QTY")?;
            Ok(refund::ReturnLineRequest {
                item: parts[0].clone(),
                quantity: number(raw, &parts[1])?,
                restock,
            })
        })
        .collect()
}

/// `METHOD[:AMOUNT]`
fn payment_line(raw: &str) -> ApiResult<(String, Option<i64>)> {
    let parts = fields(raw, 1, 2, "METHOD[:AMOUNT]")?;
    let amount = optional(&parts, 1).map(|a| number(raw, &a)).transpose()?;
    Ok((parts[0].clone(), amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_line_is_consistent() {
        CommandLine::command().debug_assert();
    }

    #[test]
    fn test_grn_line_spec() {
        let line = grn_line("COKE-330:B-7:24:45:2027-03-01:2").unwrap();
        assert_eq!(line.product, "COKE-330");
        assert_eq!(line.batch_number, "B-7");
        assert_eq!(line.quantity, 24);
        assert_eq!(line.unit_cost_cents, 45);
        assert_eq!(line.expiry_date.as_deref(), Some("2027-03-01"));
        assert_eq!(line.free_quantity, 2);

        let short = grn_line("COKE-330:B-7:24:45").unwrap();
        assert_eq!(short.expiry_date, None);
        assert_eq!(short.free_quantity, 0);

        assert!(grn_line("COKE-330:B-7:24").is_err());
        assert!(grn_line("COKE-330:B-7:many:45").is_err());
    }

    #[test]
    fn test_quantity_and_payment_lines() {
        assert_eq!(
            quantity_line("CHIPS:-3:B-1").unwrap(),
            ("CHIPS".to_string(), -3, Some("B-1".to_string()))
        );
        assert_eq!(quantity_line("CHIPS:5").unwrap().2, None);
        assert!(quantity_line(":5").is_err());

        assert_eq!(payment_line("cash:2000").unwrap(), ("cash".to_string(), Some(2000)));
        assert_eq!(payment_line("card").unwrap(), ("card".to_string(), None));

        let lines = return_lines(&["COKE-330:1".to_string()], false).unwrap();
        assert!(!lines[0].restock);
    }
}
