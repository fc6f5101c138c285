use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, FromRow, PgPool, Row};
use uuid::Uuid;

use crate::{
    domain::customer::{Customer, CustomerProfile, CustomerState},
    domain::deal::{Deal, NewDeal},
    domain::platform::Platform,
    domain::rating::{Rating, RaterKey},
    domain::report::Report,
    repository::errors::RepositoryError,
    usecase::contracts::{CustomerRepository, DealRepository, RatingRepository, ReportRepository},
};

const CUSTOMER_COLUMNS: &str =
    "id, subject, email, full_name, phone, address_line, postal_code, city, password_hash, created_at, updated_at";

const DEAL_COLUMNS: &str = "id, customer_id, platform, external_proof_ref, external_item_id, page_url, title, \
     amount, currency, completed_at, status, created_at, updated_at";

impl<'r> FromRow<'r, PgRow> for Customer {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let password_hash: Option<String> = row.try_get("password_hash")?;
        Ok(Self {
            id: row.try_get("id")?,
            subject: row.try_get("subject")?,
            profile: CustomerProfile {
                email: row.try_get("email")?,
                full_name: row.try_get("full_name")?,
                phone: row.try_get("phone")?,
                address_line: row.try_get("address_line")?,
                postal_code: row.try_get("postal_code")?,
                city: row.try_get("city")?,
            },
            state: match password_hash {
                Some(password_hash) => CustomerState::Claimed { password_hash },
                None => CustomerState::Unclaimed,
            },
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

pub struct PostgresCustomerRepository {
    pool: PgPool,
}

impl PostgresCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl CustomerRepository for PostgresCustomerRepository {
    #[tracing::instrument(skip(self), fields(%subject))]
    async fn resolve_or_create(&self, subject: &str) -> Result<Customer, RepositoryError> {
        tracing::debug!("resolving customer");

        let shadow = Customer::new_shadow(subject);

        // The no-op update makes RETURNING yield the existing row on conflict.
        let query = format!(
            r#"
            INSERT INTO customers (id, subject, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (subject) DO UPDATE SET subject = EXCLUDED.subject
            RETURNING {CUSTOMER_COLUMNS}
            "#
        );

        let customer = sqlx::query_as::<_, Customer>(&query)
            .bind(shadow.id)
            .bind(&shadow.subject)
            .bind(shadow.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        tracing::debug!(customer_id = %customer.id, created = customer.id == shadow.id, "customer resolved");
        Ok(customer)
    }

    #[tracing::instrument(skip(self), fields(%subject))]
    async fn find_by_subject(&self, subject: &str) -> Result<Option<Customer>, RepositoryError> {
        tracing::debug!("finding customer by subject");

        let query = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE subject = $1");

        let customer = sqlx::query_as::<_, Customer>(&query)
            .bind(subject)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(customer)
    }

    #[tracing::instrument(skip(self, customer), fields(customer_id = %customer.id, subject = %customer.subject))]
    async fn create(&self, customer: &Customer) -> Result<(), RepositoryError> {
        tracing::debug!("creating customer");

        sqlx::query(
            r#"
            INSERT INTO customers (id, subject, email, full_name, phone, address_line, postal_code, city,
                                   password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(customer.id)
        .bind(&customer.subject)
        .bind(&customer.profile.email)
        .bind(&customer.profile.full_name)
        .bind(&customer.profile.phone)
        .bind(&customer.profile.address_line)
        .bind(&customer.profile.postal_code)
        .bind(&customer.profile.city)
        .bind(customer.password_hash())
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        tracing::debug!(customer_id = %customer.id, "customer created successfully");
        Ok(())
    }

    #[tracing::instrument(skip(self, password_hash, profile), fields(customer_id = %id))]
    async fn claim(
        &self,
        id: Uuid,
        password_hash: &str,
        profile: &CustomerProfile,
    ) -> Result<Option<Customer>, RepositoryError> {
        tracing::debug!("claiming customer");

        let query = format!(
            r#"
            UPDATE customers
            SET password_hash = $2,
                email = COALESCE($3, email),
                full_name = COALESCE($4, full_name),
                phone = COALESCE($5, phone),
                address_line = COALESCE($6, address_line),
                postal_code = COALESCE($7, postal_code),
                city = COALESCE($8, city),
                updated_at = $9
            WHERE id = $1 AND password_hash IS NULL
            RETURNING {CUSTOMER_COLUMNS}
            "#
        );

        let customer = sqlx::query_as::<_, Customer>(&query)
            .bind(id)
            .bind(password_hash)
            .bind(&profile.email)
            .bind(&profile.full_name)
            .bind(&profile.phone)
            .bind(&profile.address_line)
            .bind(&profile.postal_code)
            .bind(&profile.city)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        tracing::debug!(claimed = customer.is_some(), "claim finished");
        Ok(customer)
    }

    #[tracing::instrument(skip(self, profile), fields(customer_id = %id))]
    async fn fill_missing_profile(&self, id: Uuid, profile: &CustomerProfile) -> Result<(), RepositoryError> {
        tracing::debug!("filling missing profile fields");

        let result = sqlx::query(
            r#"
            UPDATE customers
            SET email = COALESCE(email, $2),
                full_name = COALESCE(full_name, $3),
                phone = COALESCE(phone, $4),
                address_line = COALESCE(address_line, $5),
                postal_code = COALESCE(postal_code, $6),
                city = COALESCE(city, $7),
                updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&profile.email)
        .bind(&profile.full_name)
        .bind(&profile.phone)
        .bind(&profile.address_line)
        .bind(&profile.postal_code)
        .bind(&profile.city)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}

pub struct PostgresDealRepository {
    pool: PgPool,
}

impl PostgresDealRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DealRepository for PostgresDealRepository {
    #[tracing::instrument(skip(self, deal), fields(platform = %deal.platform, proof_ref = %deal.external_proof_ref))]
    async fn upsert(&self, deal: &NewDeal) -> Result<Deal, RepositoryError> {
        tracing::debug!("upserting deal");

        // Supplied values win, absent ones keep what is stored.
        let query = format!(
            r#"
            INSERT INTO deals (id, customer_id, platform, external_proof_ref, external_item_id, page_url, title,
                               amount, currency, completed_at, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9, 'SEK'), $10, 'PENDING_RATING', $11, $11)
            ON CONFLICT (platform, external_proof_ref) DO UPDATE SET
                external_item_id = COALESCE(EXCLUDED.external_item_id, deals.external_item_id),
                page_url = COALESCE(EXCLUDED.page_url, deals.page_url),
                title = COALESCE(EXCLUDED.title, deals.title),
                amount = COALESCE(EXCLUDED.amount, deals.amount),
                currency = COALESCE($9, deals.currency),
                completed_at = COALESCE(EXCLUDED.completed_at, deals.completed_at),
                updated_at = EXCLUDED.updated_at
            RETURNING {DEAL_COLUMNS}
            "#
        );

        let stored = sqlx::query_as::<_, Deal>(&query)
            .bind(deal.id)
            .bind(deal.customer_id)
            .bind(deal.platform)
            .bind(&deal.external_proof_ref)
            .bind(&deal.external_item_id)
            .bind(&deal.page_url)
            .bind(&deal.title)
            .bind(deal.amount)
            .bind(&deal.currency)
            .bind(deal.completed_at)
            .bind(deal.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        tracing::debug!(deal_id = %stored.id, created = stored.id == deal.id, "deal upserted successfully");
        Ok(stored)
    }

    #[tracing::instrument(skip(self), fields(deal_id = %id))]
    async fn mark_rated(&self, id: Uuid) -> Result<bool, RepositoryError> {
        tracing::debug!("marking deal as rated");

        // Only one rating may close a deal.
        let result = sqlx::query(
            r#"
            UPDATE deals
            SET status = 'RATED', updated_at = $2
            WHERE id = $1 AND status = 'PENDING_RATING'
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let won = result.rows_affected() == 1;
        tracing::debug!(won, "deal rating claim finished");
        Ok(won)
    }

    #[tracing::instrument(skip(self), fields(deal_id = %id))]
    async fn reopen(&self, id: Uuid) -> Result<(), RepositoryError> {
        tracing::debug!("reopening deal");

        let result = sqlx::query(
            r#"
            UPDATE deals
            SET status = 'PENDING_RATING', updated_at = $2
            WHERE id = $1 AND status = 'RATED'
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(%platform, %external_proof_ref))]
    async fn find_by_key(&self, platform: Platform, external_proof_ref: &str) -> Result<Option<Deal>, RepositoryError> {
        tracing::debug!("finding deal by key");

        let query = format!("SELECT {DEAL_COLUMNS} FROM deals WHERE platform = $1 AND external_proof_ref = $2");

        let deal = sqlx::query_as::<_, Deal>(&query)
            .bind(platform)
            .bind(external_proof_ref)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(deal)
    }
}

pub struct PostgresRatingRepository {
    pool: PgPool,
}

impl PostgresRatingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RatingRepository for PostgresRatingRepository {
    #[tracing::instrument(skip(self, rating), fields(rating_id = %rating.id, customer_id = %rating.customer_id, score = rating.score))]
    async fn create(&self, rating: &Rating) -> Result<(), RepositoryError> {
        tracing::debug!("creating rating");

        sqlx::query(
            r#"
            INSERT INTO ratings (id, customer_id, deal_id, score, comment, rater_name, rater_email, proof_ref,
                                 source, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(rating.id)
        .bind(rating.customer_id)
        .bind(rating.deal_id)
        .bind(rating.score)
        .bind(&rating.comment)
        .bind(&rating.rater_name)
        .bind(&rating.rater_email)
        .bind(&rating.proof_ref)
        .bind(rating.source)
        .bind(rating.created_at)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        tracing::debug!(rating_id = %rating.id, "rating created successfully");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(customer_id = %customer_id, %proof_ref, %source))]
    async fn exists_for_proof(
        &self,
        customer_id: Uuid,
        proof_ref: &str,
        source: Platform,
        rater: &RaterKey,
    ) -> Result<bool, RepositoryError> {
        tracing::debug!("checking for rating on the same proof");

        let (column, value) = match rater {
            RaterKey::Email(email) => ("rater_email", email),
            RaterKey::Name(name) => ("rater_name", name),
        };

        let query = format!(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM ratings
                WHERE customer_id = $1 AND proof_ref = $2 AND source = $3 AND {column} = $4
            )
            "#
        );

        let exists: (bool,) = sqlx::query_as(&query)
            .bind(customer_id)
            .bind(proof_ref)
            .bind(source)
            .bind(value)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(exists.0)
    }

    #[tracing::instrument(skip(self), fields(customer_id = %customer_id, %rater_name, %since))]
    async fn exists_by_rater_name_since(
        &self,
        customer_id: Uuid,
        rater_name: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        tracing::debug!("checking for recent rating by rater name");

        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM ratings
                WHERE customer_id = $1 AND rater_name = $2 AND created_at >= $3
            )
            "#,
        )
        .bind(customer_id)
        .bind(rater_name)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(exists.0)
    }

    #[tracing::instrument(skip(self), fields(customer_id = %customer_id))]
    async fn get_aggregate(&self, customer_id: Uuid) -> Result<(f64, i64), RepositoryError> {
        tracing::debug!("getting rating aggregate");

        let result: (Option<f64>, i64) = sqlx::query_as(
            r#"
            SELECT AVG(score::float8), COUNT(*)
            FROM ratings
            WHERE customer_id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let average = result.0.unwrap_or(0.0);
        tracing::debug!(customer_id = %customer_id, average, count = result.1, "rating aggregate retrieved");
        Ok((average, result.1))
    }

    #[tracing::instrument(skip(self), fields(customer_id = %customer_id))]
    async fn find_by_customer(&self, customer_id: Uuid) -> Result<Vec<Rating>, RepositoryError> {
        tracing::debug!("finding ratings by customer");

        let ratings = sqlx::query_as::<_, Rating>(
            r#"
            SELECT id, customer_id, deal_id, score, comment, rater_name, rater_email, proof_ref, source, created_at
            FROM ratings
            WHERE customer_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        tracing::debug!(customer_id = %customer_id, count = ratings.len(), "found ratings");
        Ok(ratings)
    }
}

pub struct PostgresReportRepository {
    pool: PgPool,
}

impl PostgresReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ReportRepository for PostgresReportRepository {
    #[tracing::instrument(skip(self, report), fields(report_id = %report.id, rating_id = %report.rating_id))]
    async fn create(&self, report: &Report) -> Result<(), RepositoryError> {
        tracing::debug!("creating report");

        sqlx::query(
            r#"
            INSERT INTO reports (id, customer_id, rating_id, reason, details, evidence_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(report.id)
        .bind(report.customer_id)
        .bind(report.rating_id)
        .bind(report.reason)
        .bind(&report.details)
        .bind(&report.evidence_url)
        .bind(report.created_at)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        tracing::debug!(report_id = %report.id, "report created successfully");
        Ok(())
    }
}

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
