use sqlx::postgres::{PgPool, PgPoolOptions};

pub struct DatabaseManager {
    pool: PgPool,
}

impl DatabaseManager {
    /// 데이터베이스 매니저 생성
    pub async fn new() -> Result<Self, sqlx::Error> {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await?;
        Ok(Self { pool })
    }

    /// 데이터베이스 풀 가져오기
    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }

    /// 데이터베이스 초기화 (스키마 재생성)
    pub async fn initialize_database(&self) -> Result<(), sqlx::Error> {
        let recreate_sql = include_str!("../sql/00-recreate-db.sql");
        self.execute_multi_query(recreate_sql).await?;

        let schema_sql = include_str!("../sql/01-create-schema.sql");
        self.execute_multi_query(schema_sql).await?;

        Ok(())
    }

    /// 여러 쿼리 실행
    async fn execute_multi_query(&self, sql: &str) -> Result<(), sqlx::Error> {
        for query in sql.split(';') {
            let query = query.trim();
            if !query.is_empty() {
                sqlx::query(query).execute(&self.pool).await?;
            }
        }
        Ok(())
    }
}
