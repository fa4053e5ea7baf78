//! Ration MCP Server Implementation
//!
//! Implements the MCP server with all Ration tools.

use std::sync::Arc;

use chrono::Utc;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::db::Database;
use crate::models::{
    time_of_day, DietCreate, DietEntry, DietUpdate, DishComponent, DishCreate, DishUpdate,
    GroceryCreate,
};
use crate::tools::diets;
use crate::tools::dishes;
use crate::tools::groceries;
use crate::tools::meals;
use crate::tools::status::StatusTracker;
use crate::tools::users;

/// Ration MCP Service
#[derive(Clone)]
pub struct RationService {
    status_tracker: Arc<Mutex<StatusTracker>>,
    database: Database,
    config: Config,
    tool_router: ToolRouter<RationService>,
}

impl RationService {
    pub fn new(config: Config, database: Database) -> Self {
        Self {
            status_tracker: Arc::new(Mutex::new(StatusTracker::new(&config))),
            database,
            config,
            tool_router: Self::tool_router(),
        }
    }

    /// The explicit owner, or the configured default one
    fn owner(&self, user_id: Option<i64>) -> Result<i64, McpError> {
        user_id.or(self.config.default_user_id).ok_or_else(|| {
            McpError::invalid_params(
                "user_id is required (no RATION_DEFAULT_USER configured)",
                None,
            )
        })
    }
}

// ============================================================================
// User Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateUserParams {
    pub login: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListUsersParams {
    #[serde(default = "default_list_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_list_limit() -> i64 { 50 }

// ============================================================================
// Grocery Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddGroceryParams {
    /// Owner; omit together with `shared = true` to add to the shared catalog
    pub user_id: Option<i64>,
    #[serde(default)]
    pub shared: bool,
    pub name: String,
    /// Grams per 100 g
    pub proteins: f64,
    /// Grams per 100 g
    pub fats: f64,
    /// Grams per 100 g
    pub carbohydrates: f64,
    #[serde(default)]
    pub is_liquid: bool,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetGroceryParams {
    pub id: i64,
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListGroceriesParams {
    pub user_id: Option<i64>,
    /// Case-insensitive name search
    pub name: Option<String>,
    pub is_liquid: Option<bool>,
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    #[serde(default = "default_sort_order")]
    pub sort_order: String,
    #[serde(default = "default_list_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_sort_by() -> String { "name".to_string() }
fn default_sort_order() -> String { "asc".to_string() }

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteGroceryParams {
    pub id: i64,
    pub user_id: Option<i64>,
}

// ============================================================================
// Dish Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ComponentParam {
    pub grocery_id: i64,
    pub amount_grams: f64,
}

impl From<ComponentParam> for DishComponent {
    fn from(p: ComponentParam) -> Self {
        DishComponent { grocery_id: p.grocery_id, amount_grams: p.amount_grams }
    }
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateDishParams {
    pub user_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub components: Vec<ComponentParam>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetDishParams {
    pub id: i64,
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListDishesParams {
    pub user_id: Option<i64>,
    pub query: Option<String>,
    #[serde(default = "default_list_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateDishParams {
    pub id: i64,
    pub user_id: Option<i64>,
    pub name: Option<String>,
    /// Replaces every existing component when present
    pub components: Option<Vec<ComponentParam>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteDishParams {
    pub id: i64,
    pub user_id: Option<i64>,
}

// ============================================================================
// Diet Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DietEntryParam {
    pub dish_id: i64,
    pub amount_grams: f64,
    /// Time of day, "HH:MM"
    pub time: String,
}

impl TryFrom<DietEntryParam> for DietEntry {
    type Error = McpError;

    fn try_from(p: DietEntryParam) -> Result<Self, Self::Error> {
        let time = time_of_day::parse(&p.time).map_err(|e| {
            McpError::invalid_params(format!("Invalid time '{}': {}", p.time, e), None)
        })?;
        Ok(DietEntry { dish_id: p.dish_id, amount_grams: p.amount_grams, time })
    }
}

fn parse_entries(entries: Vec<DietEntryParam>) -> Result<Vec<DietEntry>, McpError> {
    entries.into_iter().map(DietEntry::try_from).collect()
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateDietParams {
    pub user_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub entries: Vec<DietEntryParam>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetDietParams {
    pub id: i64,
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListDietsParams {
    pub user_id: Option<i64>,
    pub query: Option<String>,
    #[serde(default = "default_list_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateDietParams {
    pub id: i64,
    pub user_id: Option<i64>,
    pub name: Option<String>,
    /// Replaces every existing entry when present
    pub entries: Option<Vec<DietEntryParam>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteDietParams {
    pub id: i64,
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SelectDietParams {
    pub user_id: Option<i64>,
    /// Omit to clear the selection
    pub diet_id: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetSelectedDietParams {
    pub user_id: Option<i64>,
}

// ============================================================================
// Meal Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct LogMealParams {
    pub user_id: Option<i64>,
    pub dish_id: i64,
    pub amount_grams: f64,
    /// RFC 3339 instant, or local "YYYY-MM-DDTHH:MM[:SS]" with timezone_offset. Defaults to now.
    pub eaten_at: Option<String>,
    /// Minutes local time is behind UTC (UTC+3 is -180)
    pub timezone_offset: Option<i32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListMealsParams {
    pub user_id: Option<i64>,
    #[serde(default = "default_list_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateMealParams {
    pub id: i64,
    pub user_id: Option<i64>,
    pub amount_grams: Option<f64>,
    pub eaten_at: Option<String>,
    pub timezone_offset: Option<i32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteMealParams {
    pub id: i64,
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RemainingDietMealsParams {
    pub user_id: Option<i64>,
    /// Minutes local time is behind UTC (UTC+3 is -180)
    #[serde(default)]
    pub timezone_offset: i32,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct WeeklyStatisticsParams {
    pub user_id: Option<i64>,
    /// Minutes local time is behind UTC (UTC+3 is -180)
    #[serde(default)]
    pub timezone_offset: i32,
    /// Past days besides today, at most 366; defaults to RATION_STATS_DAYS
    pub days: Option<u32>,
}

// ============================================================================
// Tool Implementations
// ============================================================================

#[tool_router]
impl RationService {
    // --- Status ---

    #[tool(description = "Get the current status of the Ration service including build info, database status, and process information")]
    async fn ration_status(&self) -> Result<CallToolResult, McpError> {
        let tracker = self.status_tracker.lock().await;
        let status = tracker.get_status();
        let json = serde_json::to_string_pretty(&status)
            .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Get instructions for using the grocery, dish, diet and meal tools, including the timezone_offset convention. Call this when starting a session.")]
    fn usage_instructions(&self) -> Result<CallToolResult, McpError> {
        use crate::tools::status::USAGE_INSTRUCTIONS;
        Ok(CallToolResult::success(vec![Content::text(USAGE_INSTRUCTIONS)]))
    }

    // --- Users ---

    #[tool(description = "Create a user with a unique login")]
    fn create_user(&self, Parameters(p): Parameters<CreateUserParams>) -> Result<CallToolResult, McpError> {
        let result = users::create_user(&self.database, &p.login, p.is_admin).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "List users with pagination")]
    fn list_users(&self, Parameters(p): Parameters<ListUsersParams>) -> Result<CallToolResult, McpError> {
        let result = users::list_users(&self.database, p.limit, p.offset).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    // --- Groceries ---

    #[tool(description = "Add a grocery with proteins, fats and carbohydrates in grams per 100 g. Set shared=true to add it to the catalog shared by all users.")]
    fn add_grocery(&self, Parameters(p): Parameters<AddGroceryParams>) -> Result<CallToolResult, McpError> {
        let user_id = if p.shared { None } else { Some(self.owner(p.user_id)?) };
        let data = GroceryCreate {
            user_id, name: p.name, proteins: p.proteins, fats: p.fats,
            carbohydrates: p.carbohydrates, is_liquid: p.is_liquid,
        };
        let result = groceries::add_grocery(&self.database, data).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Get a grocery with its calories per 100 g and the dishes that use it")]
    fn get_grocery(&self, Parameters(p): Parameters<GetGroceryParams>) -> Result<CallToolResult, McpError> {
        let result = groceries::get_grocery(&self.database, self.owner(p.user_id)?, p.id).map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(item) => serde_json::to_string_pretty(&item),
            None => Ok(format!(r#"{{"error": "Grocery not found", "id": {}}}"#, p.id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "List the user's personal groceries and the shared catalog, with name search, liquid filter, sorting (name, proteins, fats, carbohydrates, id) and pagination")]
    fn list_groceries(&self, Parameters(p): Parameters<ListGroceriesParams>) -> Result<CallToolResult, McpError> {
        let user_id = self.owner(p.user_id)?;
        let result = groceries::list_groceries(
            &self.database, user_id, p.name.as_deref(), p.is_liquid, &p.sort_by, &p.sort_order, p.limit, p.offset,
        ).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Delete a grocery (only allowed if no dish uses it)")]
    fn delete_grocery(&self, Parameters(p): Parameters<DeleteGroceryParams>) -> Result<CallToolResult, McpError> {
        let result = groceries::delete_grocery(&self.database, self.owner(p.user_id)?, p.id).map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Ok(success) => serde_json::to_string_pretty(&success),
            Err(blocked) => serde_json::to_string_pretty(&blocked),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    // --- Dishes ---

    #[tool(description = "Create a dish from groceries with gram amounts. Returns total weight and nutrition per 100 g.")]
    fn create_dish(&self, Parameters(p): Parameters<CreateDishParams>) -> Result<CallToolResult, McpError> {
        let data = DishCreate {
            user_id: self.owner(p.user_id)?,
            name: p.name,
            components: p.components.into_iter().map(DishComponent::from).collect(),
        };
        let result = dishes::create_dish(&self.database, data).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Get a dish with its components, total weight and nutrition per 100 g")]
    fn get_dish(&self, Parameters(p): Parameters<GetDishParams>) -> Result<CallToolResult, McpError> {
        let result = dishes::get_dish(&self.database, self.owner(p.user_id)?, p.id).map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(dish) => serde_json::to_string_pretty(&dish),
            None => Ok(format!(r#"{{"error": "Dish not found", "id": {}}}"#, p.id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "List the user's dishes with nutrition per 100 g, optional name search and pagination")]
    fn list_dishes(&self, Parameters(p): Parameters<ListDishesParams>) -> Result<CallToolResult, McpError> {
        let user_id = self.owner(p.user_id)?;
        let result = dishes::list_dishes(&self.database, user_id, p.query.as_deref(), p.limit, p.offset)
            .map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Rename a dish and/or replace its components. Meals and diets referencing the dish reflect the change immediately.")]
    fn update_dish(&self, Parameters(p): Parameters<UpdateDishParams>) -> Result<CallToolResult, McpError> {
        let user_id = self.owner(p.user_id)?;
        let data = DishUpdate {
            name: p.name,
            components: p.components.map(|c| c.into_iter().map(DishComponent::from).collect()),
        };
        let result = dishes::update_dish(&self.database, user_id, p.id, data).map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(dish) => serde_json::to_string_pretty(&dish),
            None => Ok(format!(r#"{{"error": "Dish not found", "id": {}}}"#, p.id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Delete a dish. Also deletes every meal and diet entry that references it.")]
    fn delete_dish(&self, Parameters(p): Parameters<DeleteDishParams>) -> Result<CallToolResult, McpError> {
        let result = dishes::delete_dish(&self.database, self.owner(p.user_id)?, p.id).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    // --- Diets ---

    #[tool(description = "Create a diet: dishes scheduled at a time of day (\"HH:MM\") with gram amounts. Returns per-entry and total nutrition.")]
    fn create_diet(&self, Parameters(p): Parameters<CreateDietParams>) -> Result<CallToolResult, McpError> {
        let data = DietCreate {
            user_id: self.owner(p.user_id)?,
            name: p.name,
            entries: parse_entries(p.entries)?,
        };
        let result = diets::create_diet(&self.database, data).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Get a diet with per-entry and total nutrition")]
    fn get_diet(&self, Parameters(p): Parameters<GetDietParams>) -> Result<CallToolResult, McpError> {
        let result = diets::get_diet(&self.database, self.owner(p.user_id)?, p.id).map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(diet) => serde_json::to_string_pretty(&diet),
            None => Ok(format!(r#"{{"error": "Diet not found", "id": {}}}"#, p.id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "List the user's diets with total nutrition, optional name search and pagination")]
    fn list_diets(&self, Parameters(p): Parameters<ListDietsParams>) -> Result<CallToolResult, McpError> {
        let user_id = self.owner(p.user_id)?;
        let result = diets::list_diets(&self.database, user_id, p.query.as_deref(), p.limit, p.offset)
            .map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Rename a diet and/or replace its entries")]
    fn update_diet(&self, Parameters(p): Parameters<UpdateDietParams>) -> Result<CallToolResult, McpError> {
        let user_id = self.owner(p.user_id)?;
        let data = DietUpdate {
            name: p.name,
            entries: p.entries.map(parse_entries).transpose()?,
        };
        let result = diets::update_diet(&self.database, user_id, p.id, data).map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(diet) => serde_json::to_string_pretty(&diet),
            None => Ok(format!(r#"{{"error": "Diet not found", "id": {}}}"#, p.id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Delete a diet. Clears the owner's selection if it was the selected diet.")]
    fn delete_diet(&self, Parameters(p): Parameters<DeleteDietParams>) -> Result<CallToolResult, McpError> {
        let result = diets::delete_diet(&self.database, self.owner(p.user_id)?, p.id).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Select one of the user's diets, replacing any previous selection. Omit diet_id to clear the selection.")]
    fn select_diet(&self, Parameters(p): Parameters<SelectDietParams>) -> Result<CallToolResult, McpError> {
        let user_id = self.owner(p.user_id)?;
        let result = diets::select_diet(&self.database, user_id, p.diet_id).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Get the user's selected diet with per-entry and total nutrition")]
    fn get_selected_diet(&self, Parameters(p): Parameters<GetSelectedDietParams>) -> Result<CallToolResult, McpError> {
        let user_id = self.owner(p.user_id)?;
        let result = diets::get_selected_diet(&self.database, user_id).map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(diet) => serde_json::to_string_pretty(&diet),
            None => Ok(format!(r#"{{"selected_diet": null, "user_id": {}}}"#, user_id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    // --- Meals ---

    #[tool(description = "Log an eaten amount of a dish. eaten_at is an RFC 3339 instant, or a local time with timezone_offset; defaults to now.")]
    fn log_meal(&self, Parameters(p): Parameters<LogMealParams>) -> Result<CallToolResult, McpError> {
        let user_id = self.owner(p.user_id)?;
        let result = meals::log_meal(
            &self.database, user_id, p.dish_id, p.amount_grams, p.eaten_at.as_deref(), p.timezone_offset, Utc::now(),
        ).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "List the user's meals, newest first, with nutrition scaled to the eaten amount")]
    fn list_meals(&self, Parameters(p): Parameters<ListMealsParams>) -> Result<CallToolResult, McpError> {
        let user_id = self.owner(p.user_id)?;
        let result = meals::list_meals(&self.database, user_id, p.limit, p.offset).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Change the amount and/or time of a meal")]
    fn update_meal(&self, Parameters(p): Parameters<UpdateMealParams>) -> Result<CallToolResult, McpError> {
        let user_id = self.owner(p.user_id)?;
        let result = meals::update_meal(&self.database, user_id, p.id, p.amount_grams, p.eaten_at.as_deref(), p.timezone_offset)
            .map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(meal) => serde_json::to_string_pretty(&meal),
            None => Ok(format!(r#"{{"error": "Meal not found", "id": {}}}"#, p.id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Delete a meal")]
    fn delete_meal(&self, Parameters(p): Parameters<DeleteMealParams>) -> Result<CallToolResult, McpError> {
        let deleted = meals::delete_meal(&self.database, self.owner(p.user_id)?, p.id).map_err(|e| McpError::internal_error(e, None))?;
        let json = format!(r#"{{"success": {}, "id": {}}}"#, deleted, p.id);
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "List entries of the selected diet whose dish has not been eaten yet today (local day per timezone_offset), with their time projected onto today")]
    fn get_remaining_diet_meals(&self, Parameters(p): Parameters<RemainingDietMealsParams>) -> Result<CallToolResult, McpError> {
        let user_id = self.owner(p.user_id)?;
        let result = meals::get_remaining_diet_meals(&self.database, user_id, p.timezone_offset, Utc::now())
            .map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Daily calories, proteins, fats and carbohydrates over the last days plus today, bucketed by the user's local calendar day")]
    fn get_weekly_statistics(&self, Parameters(p): Parameters<WeeklyStatisticsParams>) -> Result<CallToolResult, McpError> {
        let user_id = self.owner(p.user_id)?;
        let days = p.days.unwrap_or(self.config.statistics_days);
        let result = meals::get_weekly_statistics(&self.database, user_id, p.timezone_offset, days, Utc::now())
            .map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}

// ============================================================================
// Server Handler
// ============================================================================

#[tool_handler]
impl ServerHandler for RationService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "ration".into(),
                version: crate::build_info::VERSION.into(),
                title: Some("Ration".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Ration - grocery, dish, diet and meal nutrition tracking. \
                 IMPORTANT: Call usage_instructions first; timezone_offset is minutes behind UTC (UTC+3 is -180). \
                 Users: create_user/list_users. \
                 Groceries (macros per 100 g): add/get/list/delete_grocery. \
                 Dishes (nutrition per 100 g): create/get/list/update/delete_dish. \
                 Diets (absolute totals): create/get/list/update/delete_diet, select_diet, get_selected_diet. \
                 Meals: log/list/update/delete_meal, get_remaining_diet_meals, get_weekly_statistics."
                    .into(),
            ),
        }
    }
}
